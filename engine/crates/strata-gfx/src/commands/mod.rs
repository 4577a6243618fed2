pub mod barrier;
pub mod command_encoder;
