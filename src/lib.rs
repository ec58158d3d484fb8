#[allow(non_snake_case)]
pub mod Evolution;
#[allow(non_snake_case)]
pub mod Examples;
#[allow(non_snake_case)]
pub mod LinearSystem;
#[allow(non_snake_case)]
pub mod Network;
#[allow(non_snake_case)]
pub mod Utils;
#[allow(non_snake_case)]
pub mod Zone;
pub mod errors;
