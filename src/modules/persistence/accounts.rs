use std::fs;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::paths;
use crate::error::AppResult;
use crate::models::account::{generate_account_key, Account, AccountKind};

static ACCOUNTS_LOCK: Lazy<RwLock<()>> = Lazy::new(|| RwLock::new(()));

#[derive(Debug, Serialize, Deserialize, Default)]
struct AccountStore {
    #[serde(default)]
    accounts: Vec<Account>,
}

fn read_accounts() -> AppResult<Vec<Account>> {
    let data = fs::read_to_string(paths::accounts_file()?)?;
    if data.is_empty() || data == "{}" {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<AccountStore>(&data) {
        Ok(store) => Ok(store.accounts),
        // Older exports wrote a bare array; accept it on read.
        Err(_) => Ok(serde_json::from_str::<Vec<Account>>(&data).unwrap_or_default()),
    }
}

fn write_accounts(accounts: Vec<Account>) -> AppResult<()> {
    let store = AccountStore { accounts };
    let data = serde_json::to_string_pretty(&store)?;
    fs::write(paths::accounts_file()?, data)?;
    Ok(())
}

pub fn get_accounts() -> AppResult<Vec<Account>> {
    let _guard = ACCOUNTS_LOCK.read().unwrap();
    read_accounts()
}

pub fn get_account(id: &str) -> AppResult<Option<Account>> {
    Ok(get_accounts()?.into_iter().find(|a| a.id == id))
}

pub fn get_account_by_api_key(api_key: &str) -> AppResult<Option<Account>> {
    Ok(get_accounts()?.into_iter().find(|a| a.api_key == api_key))
}

pub fn get_enabled_accounts() -> AppResult<Vec<Account>> {
    Ok(get_accounts()?.into_iter().filter(|a| a.enabled).collect())
}

pub fn add_account(
    name: String,
    github_token: String,
    account_type: AccountKind,
) -> AppResult<Account> {
    let _guard = ACCOUNTS_LOCK.write().unwrap();
    let mut accounts = read_accounts()?;
    let account = Account::new(name, github_token, account_type);
    accounts.push(account.clone());
    write_accounts(accounts)?;
    Ok(account)
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub github_token: Option<String>,
    pub account_type: Option<AccountKind>,
    pub enabled: Option<bool>,
    pub priority: Option<i32>,
}

pub fn update_account(id: &str, update: AccountUpdate) -> AppResult<Option<Account>> {
    let _guard = ACCOUNTS_LOCK.write().unwrap();
    let mut accounts = read_accounts()?;

    let Some(account) = accounts.iter_mut().find(|a| a.id == id) else {
        return Ok(None);
    };

    if let Some(name) = update.name {
        account.name = name;
    }
    if let Some(github_token) = update.github_token {
        account.github_token = github_token;
    }
    if let Some(account_type) = update.account_type {
        account.account_type = account_type;
    }
    if let Some(enabled) = update.enabled {
        account.enabled = enabled;
    }
    if let Some(priority) = update.priority {
        account.priority = priority;
    }

    let updated = account.clone();
    write_accounts(accounts)?;
    Ok(Some(updated))
}

pub fn delete_account(id: &str) -> AppResult<()> {
    let _guard = ACCOUNTS_LOCK.write().unwrap();
    let mut accounts = read_accounts()?;
    accounts.retain(|a| a.id != id);
    write_accounts(accounts)
}

pub fn regenerate_api_key(id: &str) -> AppResult<Option<String>> {
    let _guard = ACCOUNTS_LOCK.write().unwrap();
    let mut accounts = read_accounts()?;

    let Some(account) = accounts.iter_mut().find(|a| a.id == id) else {
        return Ok(None);
    };

    let new_key = generate_account_key();
    account.api_key = new_key.clone();
    write_accounts(accounts)?;
    Ok(Some(new_key))
}
