pub mod callback;
pub mod command;
pub mod link;
pub mod movie;

pub use callback::callback_handler;
pub use command::command_handler;
pub use link::link_handler;
