pub mod breakpoint;
pub mod command;
pub mod maps;
pub mod memory;
pub mod process;
pub mod trace;

#[cfg(test)]
pub mod fake;
