pub mod agent;
pub mod policy;
pub mod rl2;
