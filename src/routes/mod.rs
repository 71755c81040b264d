mod health_check;
mod register;

pub use {health_check::*, register::*};
