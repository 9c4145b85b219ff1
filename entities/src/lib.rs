pub mod stored_blob;
