#[cfg(test)]
mod common;
#[cfg(test)]
mod alloc_tests;
#[cfg(test)]
mod forwarding_tests;
#[cfg(test)]
mod squash_tests;
