pub mod attempt;
pub mod flow;
pub mod initiator;
pub mod password;
pub mod token;
pub mod totp;
