mod sled_lock;

pub use sled_lock::*;


use crate::Result;

//---
// Database namespaces
/// Sled tree holding one lease record per election scope
const MASTER_LOCK_NAMESPACE: &str = "master_lock";

#[doc(hidden)]
pub fn init_sled_lock_db(
    sled_db_root_path: impl AsRef<std::path::Path> + std::fmt::Debug
) -> Result<::sled::Db> {
    tracing::debug!("init_sled_lock_db from path: {:?}", &sled_db_root_path);

    let path = sled_db_root_path.as_ref();
    let lock_db_path = path.join("master_lock");

    ::sled::Config::default()
        .path(&lock_db_path)
        .flush_every_ms(Some(10))
        .use_compression(true)
        .compression_factor(1)
        .open()
        .map_err(|e| {
            tracing::warn!(
                "Try to open DB at this location: {:?} and failed: {:?}",
                lock_db_path,
                e
            );
            e.into()
        })
}
