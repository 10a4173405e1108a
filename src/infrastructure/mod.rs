pub mod logged_data;

pub use logged_data::{read_bandit_feedback, write_bandit_feedback};
