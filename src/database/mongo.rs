use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};
use std::error::Error;

use super::{ExpenseRepository, TokenRepository, UserRepository};
use crate::models::{AccessToken, Expense, User, DATE_FORMAT};
use crate::utils::error::AppError;

const USERS: &str = "users";
const TOKENS: &str = "personal_access_tokens";
const EXPENSES: &str = "expenses";
const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoDB {
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str) -> Result<Self, Box<dyn Error>> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        // Connection pool
        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(5);
        client_options.max_idle_time = Some(std::time::Duration::from_secs(300));

        client_options.connect_timeout = Some(std::time::Duration::from_secs(5));
        client_options.server_selection_timeout = Some(std::time::Duration::from_secs(5));

        // Database name from the URI path, or default
        let db_name = client_options
            .default_database
            .clone()
            .unwrap_or_else(|| "expense_tracker".to_string());

        let client = Client::with_options(client_options)?;

        let db = client.database(&db_name);

        // Test connection
        db.list_collection_names().await?;

        let mongodb = Self { db };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    /// Creates the indexes the queries below rely on
    async fn ensure_indexes(&self) -> Result<(), Box<dyn Error>> {
        log::info!("🔧 Creating database indexes...");

        let unique = || IndexOptions::builder().unique(true).build();

        let users_email = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(unique())
            .build();
        self.collection::<UserDocument>(USERS).create_index(users_email).await?;
        log::info!("   ✅ Index ready: users(email) unique");

        let users_id = IndexModel::builder()
            .keys(doc! { "user_id": 1 })
            .options(unique())
            .build();
        self.collection::<UserDocument>(USERS).create_index(users_id).await?;
        log::info!("   ✅ Index ready: users(user_id) unique");

        let token_hash = IndexModel::builder()
            .keys(doc! { "token_hash": 1 })
            .options(unique())
            .build();
        self.collection::<TokenDocument>(TOKENS).create_index(token_hash).await?;
        log::info!("   ✅ Index ready: personal_access_tokens(token_hash) unique");

        self.collection::<TokenDocument>(TOKENS)
            .create_index(token_expiry_index())
            .await?;
        log::info!("   ✅ Index ready: personal_access_tokens(expires_at) TTL");

        // Owner listing: filter by user, newest first
        let expenses_owner = IndexModel::builder()
            .keys(doc! { "user_id": 1, "created_at": -1, "_id": -1 })
            .build();
        self.collection::<ExpenseDocument>(EXPENSES).create_index(expenses_owner).await?;
        log::info!("   ✅ Index ready: expenses(user_id, created_at desc)");

        log::info!("✅ Database indexes ready");

        Ok(())
    }

    fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }
}

/// MongoDB removes a token once `expires_at` has passed, so abandoned
/// tokens do not pile up. Tokens without expiry have no date and stay.
fn token_expiry_index() -> IndexModel {
    IndexModel::builder()
        .keys(doc! { "expires_at": 1 })
        .options(
            IndexOptions::builder()
                .expire_after(std::time::Duration::ZERO)
                .build(),
        )
        .build()
}

// ==================== DOCUMENTS ====================

#[derive(Debug, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    user_id: String,
    email: String,
    password: String,
    name: Option<String>,
    created_at: BsonDateTime,
    updated_at: BsonDateTime,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    user_id: String,
    name: String,
    token_hash: String,
    created_at: BsonDateTime,
    last_used_at: Option<BsonDateTime>,
    expires_at: Option<BsonDateTime>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ExpenseDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    user_id: String,
    item_name: String,
    amount: f64,
    /// YYYY-MM-DD
    date: String,
    created_at: BsonDateTime,
    updated_at: BsonDateTime,
}

fn to_bson(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

fn from_bson(dt: BsonDateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis()).unwrap_or_default()
}

fn parse_object_id(id: &str, what: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(id).map_err(|_| AppError::Internal(format!("{} id is not an ObjectId: {}", what, id)))
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        e.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

impl From<&User> for UserDocument {
    fn from(user: &User) -> Self {
        UserDocument {
            id: None,
            user_id: user.user_id.clone(),
            email: user.email.clone(),
            password: user.password.clone(),
            name: user.name.clone(),
            created_at: to_bson(user.created_at),
            updated_at: to_bson(user.updated_at),
        }
    }
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        User {
            user_id: doc.user_id,
            email: doc.email,
            password: doc.password,
            name: doc.name,
            created_at: from_bson(doc.created_at),
            updated_at: from_bson(doc.updated_at),
        }
    }
}

impl From<TokenDocument> for AccessToken {
    fn from(doc: TokenDocument) -> Self {
        AccessToken {
            id: doc.id.to_hex(),
            user_id: doc.user_id,
            name: doc.name,
            token_hash: doc.token_hash,
            created_at: from_bson(doc.created_at),
            last_used_at: doc.last_used_at.map(from_bson),
            expires_at: doc.expires_at.map(from_bson),
        }
    }
}

impl TryFrom<ExpenseDocument> for Expense {
    type Error = AppError;

    fn try_from(doc: ExpenseDocument) -> Result<Self, Self::Error> {
        let date = NaiveDate::parse_from_str(&doc.date, DATE_FORMAT).map_err(|e| {
            AppError::DatabaseError(format!("Expense {} has invalid date '{}': {}", doc.id, doc.date, e))
        })?;

        Ok(Expense {
            id: doc.id.to_hex(),
            item_name: doc.item_name,
            amount: doc.amount,
            date,
            user_id: doc.user_id,
            created_at: from_bson(doc.created_at),
            updated_at: from_bson(doc.updated_at),
        })
    }
}

// ==================== REPOSITORIES ====================

#[async_trait]
impl UserRepository for MongoDB {
    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        self.collection::<UserDocument>(USERS)
            .insert_one(UserDocument::from(user))
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    AppError::Conflict("User already exists".to_string())
                } else {
                    AppError::from(e)
                }
            })?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = self
            .collection::<UserDocument>(USERS)
            .find_one(doc! { "email": email })
            .await?;
        Ok(user.map(User::from))
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, AppError> {
        let user = self
            .collection::<UserDocument>(USERS)
            .find_one(doc! { "user_id": user_id })
            .await?;
        Ok(user.map(User::from))
    }
}

#[async_trait]
impl TokenRepository for MongoDB {
    async fn insert_token(&self, token: &AccessToken) -> Result<(), AppError> {
        let document = TokenDocument {
            id: parse_object_id(&token.id, "Token")?,
            user_id: token.user_id.clone(),
            name: token.name.clone(),
            token_hash: token.token_hash.clone(),
            created_at: to_bson(token.created_at),
            last_used_at: token.last_used_at.map(to_bson),
            expires_at: token.expires_at.map(to_bson),
        };
        self.collection::<TokenDocument>(TOKENS).insert_one(document).await?;
        Ok(())
    }

    async fn find_token_by_hash(&self, token_hash: &str) -> Result<Option<AccessToken>, AppError> {
        let token = self
            .collection::<TokenDocument>(TOKENS)
            .find_one(doc! { "token_hash": token_hash })
            .await?;
        Ok(token.map(AccessToken::from))
    }

    async fn touch_token(
        &self,
        token_id: &str,
        last_used_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let id = parse_object_id(token_id, "Token")?;
        self.collection::<TokenDocument>(TOKENS)
            .update_one(
                doc! { "_id": id },
                doc! { "$set": {
                    "last_used_at": to_bson(last_used_at),
                    "expires_at": expires_at.map(to_bson),
                } },
            )
            .await?;
        Ok(())
    }

    async fn delete_token(&self, token_id: &str) -> Result<(), AppError> {
        let id = parse_object_id(token_id, "Token")?;
        self.collection::<TokenDocument>(TOKENS)
            .delete_one(doc! { "_id": id })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ExpenseRepository for MongoDB {
    async fn insert_expense(&self, expense: &Expense) -> Result<(), AppError> {
        let document = ExpenseDocument {
            id: parse_object_id(&expense.id, "Expense")?,
            user_id: expense.user_id.clone(),
            item_name: expense.item_name.clone(),
            amount: expense.amount,
            date: expense.date.format(DATE_FORMAT).to_string(),
            created_at: to_bson(expense.created_at),
            updated_at: to_bson(expense.updated_at),
        };
        self.collection::<ExpenseDocument>(EXPENSES).insert_one(document).await?;
        Ok(())
    }

    async fn find_expenses_by_owner(
        &self,
        owner_id: &str,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<Expense>, u64), AppError> {
        let collection = self.collection::<ExpenseDocument>(EXPENSES);
        let filter = doc! { "user_id": owner_id };

        let total = collection.count_documents(filter.clone()).await?;

        let documents: Vec<ExpenseDocument> = collection
            .find(filter)
            .sort(doc! { "created_at": -1, "_id": -1 })
            .skip(page.saturating_sub(1).saturating_mul(per_page))
            .limit(per_page as i64)
            .await?
            .try_collect()
            .await?;

        let expenses = documents
            .into_iter()
            .map(Expense::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((expenses, total))
    }

    async fn find_expense_by_id(&self, expense_id: &str) -> Result<Option<Expense>, AppError> {
        // A malformed id cannot match any record
        let Ok(id) = ObjectId::parse_str(expense_id) else {
            return Ok(None);
        };

        self.collection::<ExpenseDocument>(EXPENSES)
            .find_one(doc! { "_id": id })
            .await?
            .map(Expense::try_from)
            .transpose()
    }

    async fn delete_expense(&self, expense_id: &str) -> Result<bool, AppError> {
        let Ok(id) = ObjectId::parse_str(expense_id) else {
            return Ok(false);
        };

        let result = self
            .collection::<ExpenseDocument>(EXPENSES)
            .delete_one(doc! { "_id": id })
            .await?;
        Ok(result.deleted_count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::now_millis;

    #[test]
    fn test_token_expiry_index_is_ttl() {
        let index = token_expiry_index();
        assert_eq!(index.keys, doc! { "expires_at": 1 });
        let options = index.options.expect("index options");
        assert_eq!(options.expire_after, Some(std::time::Duration::ZERO));
    }

    #[test]
    fn test_bson_datetime_roundtrip_keeps_millis() {
        let now = now_millis();
        assert_eq!(from_bson(to_bson(now)), now);
    }

    #[test]
    fn test_invalid_stored_date_is_a_database_error() {
        let doc = ExpenseDocument {
            id: ObjectId::new(),
            user_id: "u1".to_string(),
            item_name: "Coffee".to_string(),
            amount: 4.5,
            date: "15/01/2024".to_string(),
            created_at: BsonDateTime::now(),
            updated_at: BsonDateTime::now(),
        };
        assert!(matches!(Expense::try_from(doc), Err(AppError::DatabaseError(_))));
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_mongodb_expense_listing() {
        dotenv::dotenv().ok();
        let uri = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017/expense_tracker_test".to_string());
        let db = MongoDB::new(&uri).await.unwrap();

        let owner = ObjectId::new().to_hex();
        for i in 0..3 {
            let now = now_millis();
            let expense = Expense {
                id: ObjectId::new().to_hex(),
                item_name: format!("Item {}", i),
                amount: 1.0 + i as f64,
                date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                user_id: owner.clone(),
                created_at: now,
                updated_at: now,
            };
            db.insert_expense(&expense).await.unwrap();
        }

        let (page, total) = db.find_expenses_by_owner(&owner, 1, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].item_name, "Item 2");

        assert!(db.delete_expense(&page[0].id).await.unwrap());
        assert!(!db.delete_expense(&page[0].id).await.unwrap());
    }
}
