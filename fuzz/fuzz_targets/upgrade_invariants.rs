//! Upgrade fuzzer: three random tables over a narrow id range must satisfy
//! the merge guarantees.

use honggfuzz::fuzz;
use param_diff_rs::testing::{UpgradeInput, test_upgrade_input};

fn main() {
    loop {
        fuzz!(|input: UpgradeInput| {
            test_upgrade_input(&input);
        });
    }
}
