pub mod remote_objects;
pub mod update_caches;
pub mod util;
