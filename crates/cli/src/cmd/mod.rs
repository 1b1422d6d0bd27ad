mod check;
mod report;

pub use check::cmd_check;
pub use report::cmd_report;
