pub mod controllers;
pub mod multiply_shift;
