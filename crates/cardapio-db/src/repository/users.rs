use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
};

use crate::entities::user::{self, ActiveModel as UserActive, Entity as User, Model as UserModel};
use crate::error::{RepoError, RepoResult};

/// Fields of a user being created; a federated id also enables that login
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub facebook_id: Option<String>,
}

pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i32) -> RepoResult<Option<UserModel>> {
    Ok(User::find_by_id(id).one(db).await?)
}

/// Lookup by email; callers pass it already normalized
pub async fn find_by_email<C: ConnectionTrait>(
    db: &C,
    email: &str,
) -> RepoResult<Option<UserModel>> {
    Ok(User::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await?)
}

/// Lookup by Google subject id
pub async fn find_by_google_id<C: ConnectionTrait>(
    db: &C,
    google_id: &str,
) -> RepoResult<Option<UserModel>> {
    Ok(User::find()
        .filter(user::Column::GoogleId.eq(google_id))
        .one(db)
        .await?)
}

/// Lookup by Facebook user id
pub async fn find_by_facebook_id<C: ConnectionTrait>(
    db: &C,
    facebook_id: &str,
) -> RepoResult<Option<UserModel>> {
    Ok(User::find()
        .filter(user::Column::FacebookId.eq(facebook_id))
        .one(db)
        .await?)
}

pub async fn exists_by_email<C: ConnectionTrait>(db: &C, email: &str) -> RepoResult<bool> {
    Ok(User::find()
        .filter(user::Column::Email.eq(email))
        .count(db)
        .await?
        > 0)
}

/// Insert a user. A taken email surfaces as [`RepoError::Conflict`].
pub async fn create<C: ConnectionTrait>(db: &C, new_user: NewUser) -> RepoResult<UserModel> {
    let now = Utc::now();

    let model = UserActive {
        name: Set(new_user.name),
        email: Set(new_user.email),
        password_hash: Set(new_user.password_hash),
        google_login: Set(new_user.google_id.is_some()),
        google_id: Set(new_user.google_id),
        facebook_login: Set(new_user.facebook_id.is_some()),
        facebook_id: Set(new_user.facebook_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    Ok(model.insert(db).await?)
}

/// Persist changes made to an existing user
pub async fn save<C: ConnectionTrait>(db: &C, mut model: UserActive) -> RepoResult<UserModel> {
    model.updated_at = Set(Utc::now());
    Ok(model.update(db).await?)
}

/// Delete a user together with everything they own (FK cascade).
/// Returns whether a row was removed.
pub async fn delete_by_id<C: ConnectionTrait>(db: &C, id: i32) -> RepoResult<bool> {
    let result = User::delete_by_id(id).exec(db).await?;
    Ok(result.rows_affected > 0)
}

/// Load a user or fail with [`RepoError::NotFound`]
pub async fn get<C: ConnectionTrait>(db: &C, id: i32) -> RepoResult<UserModel> {
    find_by_id(db, id).await?.ok_or(RepoError::NotFound)
}
