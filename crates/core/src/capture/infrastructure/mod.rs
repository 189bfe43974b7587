pub mod capture_worker;
pub mod image_file_reader;
pub mod image_sequence_source;
