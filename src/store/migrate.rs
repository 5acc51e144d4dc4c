use crate::rewards::types::{level_for_xp, UserProgress};
use crate::store::{Store, StoreError};

const VERSION_KEY: &str = "_meta:version";

type MigrationFn = fn(&Store) -> Result<(), StoreError>;

fn migrations() -> Vec<(&'static str, MigrationFn)> {
    vec![
        ("001_initial", m001_initial),
        ("002_recompute_levels", m002_recompute_levels),
    ]
}

/// 执行所有未应用的数据库迁移。
///
/// 每个迁移必须幂等：进程可能在迁移完成后、写入版本号之前退出。
/// 版本号只能前进，set_version 拒绝降级。
pub fn run(store: &Store) -> Result<(), StoreError> {
    let current = get_current_version(store)?;

    for (index, (name, func)) in migrations().iter().enumerate() {
        let version = (index + 1) as u32;
        if version > current {
            tracing::info!(version, name, "Running migration");
            func(store)?;
            set_version(store, version)?;
            tracing::info!(version, name, "Migration complete");
        } else {
            tracing::debug!(version, name, "Migration already applied, skipping");
        }
    }

    Ok(())
}

pub fn get_current_version(store: &Store) -> Result<u32, StoreError> {
    match store.meta.get(VERSION_KEY.as_bytes())? {
        Some(raw) => {
            let bytes: [u8; 4] = raw.as_ref().try_into().map_err(|_| StoreError::Migration {
                version: 0,
                message: format!("corrupt version marker ({} bytes)", raw.len()),
            })?;
            Ok(u32::from_be_bytes(bytes))
        }
        None => Ok(0),
    }
}

pub fn set_version(store: &Store, version: u32) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    if version < current {
        return Err(StoreError::Migration {
            version,
            message: format!("Refuse to downgrade from {current} to {version}"),
        });
    }

    store
        .meta
        .insert(VERSION_KEY.as_bytes(), &version.to_be_bytes())?;
    Ok(())
}

fn m001_initial(_store: &Store) -> Result<(), StoreError> {
    Ok(())
}

/// Older rows may carry a level computed with a different curve; level is always derived from xp.
fn m002_recompute_levels(store: &Store) -> Result<(), StoreError> {
    let mut fixed = 0usize;
    for item in store.user_progress.iter() {
        let (key, raw) = item?;
        let mut progress: UserProgress = Store::deserialize(&raw)?;
        let expected = level_for_xp(progress.xp);
        if progress.level == expected {
            continue;
        }
        progress.level = expected;
        let bytes = Store::serialize(&progress)?;
        // 并发写入者已更新该行时跳过，写入者自己会维护 level
        if store
            .user_progress
            .compare_and_swap(&key, Some(&raw), Some(bytes))?
            .is_ok()
        {
            fixed += 1;
        }
    }
    tracing::info!(fixed, "Recomputed stored levels");
    Ok(())
}
