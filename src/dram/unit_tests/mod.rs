#[cfg(test)]
mod channel_state_tests;
#[cfg(test)]
mod controller_tests;
#[cfg(test)]
mod support;
