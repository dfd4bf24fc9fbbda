mod handler;

pub use self::handler::StateHandler;
