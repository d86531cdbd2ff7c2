use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::models::UserRecord;

const TABLE_NAME: &str = "users";
const HEADER: [&str; 4] = ["username", "password", "time_interval", "country"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt users table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Username already exists!")]
    AlreadyExists(String),

    #[error("User doesn't exist")]
    NotFound(String),
}

/// Users table kept as a CSV file under the database directory.
///
/// The first column is the primary key. Writers rewrite the whole file into
/// a temporary sibling and rename it over the table, one writer at a time.
pub struct UserStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl UserStore {
    /// Open the table in `db_dir`, creating the directory and an empty table
    /// if needed.
    pub async fn open(db_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_dir = db_dir.as_ref();
        tokio::fs::create_dir_all(db_dir).await?;

        let path = db_dir.join(TABLE_NAME);
        if !tokio::fs::try_exists(&path).await? {
            info!("Creating users table at {}", path.display());
            write_table(&path, &[]).await?;
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub async fn get_user(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let key = username.trim().to_lowercase();
        let users = read_table(&self.path).await?;
        Ok(users.into_iter().find(|u| u.username == key))
    }

    /// Append a new user. The username must not be taken.
    pub async fn add_user(&self, user: UserRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut users = read_table(&self.path).await?;

        if users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::AlreadyExists(user.username));
        }

        debug!(username = %user.username, "adding user");
        users.push(user);
        write_table(&self.path, &users).await
    }

    pub async fn update_time_interval(
        &self,
        username: &str,
        time_interval: u32,
    ) -> Result<UserRecord, StoreError> {
        self.update(username, |user| user.time_interval = time_interval)
            .await
    }

    pub async fn update_country(&self, username: &str, country: &str) -> Result<UserRecord, StoreError> {
        self.update(username, |user| user.country = country.to_string())
            .await
    }

    async fn update<F>(&self, username: &str, apply: F) -> Result<UserRecord, StoreError>
    where
        F: FnOnce(&mut UserRecord),
    {
        let key = username.trim().to_lowercase();
        let _guard = self.write_lock.lock().await;
        let mut users = read_table(&self.path).await?;

        let user = users
            .iter_mut()
            .find(|u| u.username == key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        apply(user);
        let updated = user.clone();

        write_table(&self.path, &users).await?;
        Ok(updated)
    }
}

async fn read_table(path: &Path) -> Result<Vec<UserRecord>, StoreError> {
    let bytes = tokio::fs::read(path).await?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(bytes.as_slice());

    let users = reader
        .deserialize::<UserRecord>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

async fn write_table(path: &Path, users: &[UserRecord]) -> Result<(), StoreError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(HEADER)?;
    for user in users {
        writer.serialize(user)?;
    }
    let data = writer.into_inner().map_err(|e| StoreError::Io(e.into_error()))?;

    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(username: &str) -> UserRecord {
        UserRecord {
            username: username.to_string(),
            password: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            time_interval: 12,
            country: "GE".to_string(),
        }
    }

    #[tokio::test]
    async fn test_open_creates_table_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let _store = UserStore::open(dir.path().join("dbase")).await.unwrap();

        let contents = std::fs::read_to_string(dir.path().join("dbase").join("users")).unwrap();
        assert_eq!(contents.trim(), "username,password,time_interval,country");
    }

    #[tokio::test]
    async fn test_add_and_get_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::open(dir.path()).await.unwrap();

        store.add_user(record("user1")).await.unwrap();

        let found = store.get_user("USER1").await.unwrap().unwrap();
        assert_eq!(found, record("user1"));
        assert!(store.get_user("user2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::open(dir.path()).await.unwrap();

        store.add_user(record("user1")).await.unwrap();
        let err = store.add_user(record("user1")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_updates_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = UserStore::open(dir.path()).await.unwrap();
            store.add_user(record("user1")).await.unwrap();
            store.add_user(record("user2")).await.unwrap();

            let updated = store.update_time_interval("user1", 30).await.unwrap();
            assert_eq!(updated.time_interval, 30);
            let updated = store.update_country("user2", "FR").await.unwrap();
            assert_eq!(updated.country, "FR");
        }

        let store = UserStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get_user("user1").await.unwrap().unwrap().time_interval, 30);
        assert_eq!(store.get_user("user2").await.unwrap().unwrap().country, "FR");
        // The password hash contains commas and must come back intact
        assert_eq!(store.get_user("user1").await.unwrap().unwrap().password, record("x").password);
    }

    #[tokio::test]
    async fn test_update_unknown_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::open(dir.path()).await.unwrap();

        let err = store.update_country("ghost", "US").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
