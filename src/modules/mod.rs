pub mod jtc;
pub mod raffle;
pub mod system;
pub mod warnings;
