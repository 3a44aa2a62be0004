//! Response payload decoders: fixed length, chunked and read-until-close.

mod chunked_decoder;
mod length_decoder;
mod payload_decoder;

pub use chunked_decoder::ChunkedDecoder;
pub use length_decoder::LengthDecoder;
pub use payload_decoder::PayloadDecoder;
