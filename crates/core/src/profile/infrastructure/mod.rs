pub mod in_memory_metadata_store;
pub mod json_profile_store;
