use crate::config::{APP_NAME, environment_suffix};
use crate::errors::{AppError, AppResult};

/// Windows Credential Manager rejects long secrets, so they are split over
/// numbered entries there.
const WINDOWS_CHUNK_LEN: usize = 500;

fn chunk_limit() -> Option<usize> {
    if cfg!(target_os = "windows") {
        Some(WINDOWS_CHUNK_LEN)
    } else {
        None
    }
}

/// Secrets of the calendar adapters, kept in the OS-native keyring.
#[derive(Debug, Clone)]
pub struct KeyringCredentialsStore {
    service_name: String,
    account_name: String,
}

impl KeyringCredentialsStore {
    pub fn new(kind: &str) -> Self {
        let service_name = format!("{APP_NAME}{}", environment_suffix());
        Self {
            account_name: format!("{service_name}-{kind}"),
            service_name,
        }
    }

    fn entry(&self, account: &str) -> AppResult<keyring::Entry> {
        keyring::Entry::new(&self.service_name, account)
            .map_err(|error| AppError::Credential(error.to_string()))
    }

    fn chunk_account(&self, index: usize) -> String {
        format!("{}-{}", self.account_name, index)
    }

    fn get(&self, account: &str) -> AppResult<Option<String>> {
        match self.entry(account)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AppError::Credential(error.to_string())),
        }
    }

    fn delete(&self, account: &str) -> AppResult<bool> {
        match self.entry(account)?.delete_credential() {
            Ok(_) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(error) => Err(AppError::Credential(error.to_string())),
        }
    }

    pub fn load(&self) -> AppResult<Option<String>> {
        if chunk_limit().is_none() {
            return self.get(&self.account_name);
        }

        let mut secret = String::new();
        let mut index = 0;
        while let Some(part) = self.get(&self.chunk_account(index))? {
            secret.push_str(&part);
            index += 1;
        }
        Ok(if index == 0 { None } else { Some(secret) })
    }

    pub fn save(&self, secret: &str) -> AppResult<()> {
        self.delete_all()?;

        let Some(limit) = chunk_limit() else {
            return self
                .entry(&self.account_name)?
                .set_password(secret)
                .map_err(|error| AppError::Credential(error.to_string()));
        };

        let chars: Vec<char> = secret.chars().collect();
        for (index, chunk) in chars.chunks(limit).enumerate() {
            let part: String = chunk.iter().collect();
            self.entry(&self.chunk_account(index))?
                .set_password(&part)
                .map_err(|error| AppError::Credential(error.to_string()))?;
        }
        Ok(())
    }

    /// Deleting absent credentials is not an error.
    pub fn delete_all(&self) -> AppResult<()> {
        if chunk_limit().is_none() {
            self.delete(&self.account_name)?;
            return Ok(());
        }

        let mut index = 0;
        while self.delete(&self.chunk_account(index))? {
            index += 1;
        }
        Ok(())
    }
}
