pub mod analyser;
pub mod decode;
pub mod element;
pub mod graph;
pub mod spectrum;
