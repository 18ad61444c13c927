pub mod bootstrap;
pub mod check;
pub mod record;
pub mod run;
