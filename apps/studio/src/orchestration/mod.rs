// Generate–compile orchestration.
// Generate Invoker → source cell → debounce → Compile Invoker → artifact slot.
// Remote services are reached only through the traits in `crate::remote`.

pub mod activity;
pub mod artifact;
pub mod compile;
pub mod controller;
pub mod debounce;
pub mod export;
pub mod generate;
pub mod handlers;
pub mod source;

#[cfg(test)]
pub mod testing;
