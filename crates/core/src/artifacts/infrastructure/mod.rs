pub mod fs_artifact_store;
