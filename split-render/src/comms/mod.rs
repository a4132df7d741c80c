pub mod channels;
pub mod render2owner;
