use sqlx::SqlitePool;
use tracing::{error, warn};

use crate::auth::{
    errors::AuthError,
    repo_types::{encode_applications, Applications, User},
};

const USER_COLUMNS: &str = "id, email, hashed_password, google_id, is_google_account, applications";

impl User {
    /// Find a user by email (exact, case-sensitive match).
    pub async fn find_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Resolve the single account owning either the email or the Google id.
    ///
    /// Two distinct rows matching (one by email, another by Google id) is an
    /// integrity error, never a silent pick.
    pub async fn find_by_email_or_google_id(
        db: &SqlitePool,
        email: &str,
        google_id: &str,
    ) -> Result<User, AuthError> {
        let mut users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?1 OR google_id = ?2 LIMIT 2"
        ))
        .bind(email)
        .bind(google_id)
        .fetch_all(db)
        .await?;

        match users.len() {
            0 => Err(AuthError::NotFound),
            1 => Ok(users.remove(0)),
            _ => {
                let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
                warn!(?ids, "email and google id resolve to different accounts");
                Err(AuthError::Integrity(format!(
                    "email and google id match multiple users: {ids:?}"
                )))
            }
        }
    }

    /// Insert a local account. A duplicate email rolls the transaction back and
    /// surfaces as `Conflict`.
    pub async fn create(
        db: &SqlitePool,
        email: &str,
        hashed_password: &str,
        applications: &Applications,
    ) -> Result<User, AuthError> {
        let applications = encode_applications(applications)?;
        let mut tx = db.begin().await?;

        let inserted = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, hashed_password, is_google_account, applications)
            VALUES (?1, ?2, 0, ?3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(hashed_password)
        .bind(applications.as_str())
        .fetch_one(&mut *tx)
        .await;

        match inserted {
            Ok(user) => {
                tx.commit().await?;
                Ok(user)
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tx.rollback().await?;
                warn!(email = %email, "email already registered");
                Err(AuthError::Conflict)
            }
            Err(e) => {
                error!(error = %e, "insert user failed");
                tx.rollback().await?;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn apps(pairs: &[(&str, &str)]) -> Applications {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    async fn count_users(db: &SqlitePool) -> i64 {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(db)
            .await
            .unwrap();
        n
    }

    async fn insert_google_user(db: &SqlitePool, email: &str, google_id: &str) {
        sqlx::query(
            "INSERT INTO users (email, google_id, is_google_account, applications) VALUES (?1, ?2, 1, ?3)",
        )
        .bind(email)
        .bind(google_id)
        .bind(r#"{"app2":"viewer"}"#)
        .execute(db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn create_assigns_id_and_stores_json_applications() {
        let db = db::memory().await;
        let user = User::create(&db, "a@x.com", "hash", &apps(&[("app1", "admin")]))
            .await
            .unwrap();
        assert!(user.id > 0);
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.hashed_password.as_deref(), Some("hash"));
        assert!(!user.is_google_account);
        assert_eq!(user.applications, r#"{"app1":"admin"}"#);
        assert_eq!(user.applications().unwrap(), apps(&[("app1", "admin")]));
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict_and_leaves_one_row() {
        let db = db::memory().await;
        User::create(&db, "a@x.com", "h1", &Applications::new())
            .await
            .unwrap();
        let err = User::create(&db, "a@x.com", "h2", &Applications::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict));
        assert_eq!(count_users(&db).await, 1);

        let stored = User::find_by_email(&db, "a@x.com").await.unwrap().unwrap();
        assert_eq!(stored.hashed_password.as_deref(), Some("h1"));
    }

    #[tokio::test]
    async fn email_lookup_is_case_sensitive() {
        let db = db::memory().await;
        User::create(&db, "a@x.com", "h", &Applications::new())
            .await
            .unwrap();
        assert!(User::find_by_email(&db, "a@x.com").await.unwrap().is_some());
        assert!(User::find_by_email(&db, "A@X.COM").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn email_or_google_id_resolves_exactly_one() {
        let db = db::memory().await;
        insert_google_user(&db, "g@x.com", "gid-1").await;

        let by_id = User::find_by_email_or_google_id(&db, "other@x.com", "gid-1")
            .await
            .unwrap();
        assert_eq!(by_id.email, "g@x.com");

        let by_email = User::find_by_email_or_google_id(&db, "g@x.com", "unknown")
            .await
            .unwrap();
        assert_eq!(by_email.google_id.as_deref(), Some("gid-1"));
    }

    #[tokio::test]
    async fn email_or_google_id_with_no_match_is_not_found() {
        let db = db::memory().await;
        let err = User::find_by_email_or_google_id(&db, "nobody@x.com", "gid")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn email_or_google_id_matching_two_accounts_is_integrity_error() {
        let db = db::memory().await;
        User::create(&db, "local@x.com", "h", &Applications::new())
            .await
            .unwrap();
        insert_google_user(&db, "g@x.com", "gid-1").await;

        let err = User::find_by_email_or_google_id(&db, "local@x.com", "gid-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Integrity(_)));
    }

    #[tokio::test]
    async fn google_id_is_unique() {
        let db = db::memory().await;
        insert_google_user(&db, "g1@x.com", "gid-1").await;
        let res = sqlx::query(
            "INSERT INTO users (email, google_id, applications) VALUES ('g2@x.com', 'gid-1', '{}')",
        )
        .execute(&db)
        .await;
        assert!(res.is_err());
    }
}
