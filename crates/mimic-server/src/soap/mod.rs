//! SOAP protocol support: canonical request normalization, the parsed
//! service contract, and schema-driven response synthesis.

mod request;
mod synthesizer;
pub mod wsdl;

pub use request::{Operation, SoapRequest};
pub use synthesizer::SoapSynthesizer;
pub use wsdl::Wsdl;
