//! Registered suites, in run order

mod index_page;

use sitecheck::Suite;

/// Every suite the `test` command runs
#[must_use]
pub fn all() -> Vec<Suite> {
    vec![index_page::suite()]
}
