//! Integration tests for cardapio-db
//!
//! Tests repository operations with a real SQLite in-memory database

use std::str::FromStr;

use cardapio_db::entities::{category, product, user};
use cardapio_db::repository::categories::{self, CategoryChanges, NewCategory};
use cardapio_db::repository::products::{self, NewProduct, ProductChanges};
use cardapio_db::repository::users::{self, NewUser};
use cardapio_db::{build_menu, connect, migrate, RepoError};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait};

/// Helper to create a test database
async fn setup_test_db() -> DatabaseConnection {
    let db = connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    migrate(&db).await.expect("Failed to run migrations");

    db
}

async fn create_user(db: &DatabaseConnection, name: &str, email: &str) -> user::Model {
    users::create(
        db,
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: Some("$argon2id$placeholder".to_string()),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to create user")
}

async fn create_category(db: &DatabaseConnection, owner_id: i32, name: &str) -> category::Model {
    categories::create(
        db,
        owner_id,
        NewCategory {
            name: name.to_string(),
            description: None,
        },
    )
    .await
    .expect("Failed to create category")
}

fn new_product(name: &str, price: &str, available: bool, category_id: Option<i32>) -> NewProduct {
    NewProduct {
        name: name.to_string(),
        price: Decimal::from_str(price).unwrap(),
        available,
        description: None,
        quantity: None,
        category_id,
    }
}

#[tokio::test]
async fn test_database_connection() {
    let db = connect("sqlite::memory:").await.expect("Failed to connect");

    let backend = db.get_database_backend();
    assert!(matches!(backend, sea_orm::DatabaseBackend::Sqlite));
}

#[tokio::test]
async fn test_migrations_run_successfully() {
    let db = connect("sqlite::memory:").await.expect("Failed to connect");

    assert!(migrate(&db).await.is_ok());
    // Applied migrations are recorded, so a second run is a no-op
    assert!(migrate(&db).await.is_ok());
}

#[tokio::test]
async fn test_user_lookup_by_email_and_federated_ids() {
    let db = setup_test_db().await;

    let created = users::create(
        &db,
        NewUser {
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            google_id: Some("google-sub-1".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert!(created.google_login);
    assert!(!created.facebook_login);
    assert!(created.password_hash.is_none());

    let by_email = users::find_by_email(&db, "ana@example.com").await.unwrap();
    assert_eq!(by_email.map(|u| u.id), Some(created.id));

    let by_google = users::find_by_google_id(&db, "google-sub-1").await.unwrap();
    assert_eq!(by_google.map(|u| u.id), Some(created.id));

    assert!(users::find_by_facebook_id(&db, "google-sub-1")
        .await
        .unwrap()
        .is_none());
    assert!(users::exists_by_email(&db, "ana@example.com").await.unwrap());
    assert!(!users::exists_by_email(&db, "bia@example.com").await.unwrap());
}

#[tokio::test]
async fn test_duplicate_email_is_conflict() {
    let db = setup_test_db().await;
    create_user(&db, "Ana", "ana@example.com").await;

    let result = users::create(
        &db,
        NewUser {
            name: "Other Ana".to_string(),
            email: "ana@example.com".to_string(),
            ..Default::default()
        },
    )
    .await;

    assert!(matches!(result, Err(RepoError::Conflict(_))));
}

#[tokio::test]
async fn test_category_name_unique_per_owner() {
    let db = setup_test_db().await;
    let ana = create_user(&db, "Ana", "ana@example.com").await;
    let bia = create_user(&db, "Bia", "bia@example.com").await;

    create_category(&db, ana.id, "Bebidas").await;

    let duplicate = categories::create(
        &db,
        ana.id,
        NewCategory {
            name: "Bebidas".to_string(),
            description: Some("again".to_string()),
        },
    )
    .await;
    assert!(matches!(duplicate, Err(RepoError::Conflict(_))));

    // Same name under another owner is fine
    let other = categories::create(
        &db,
        bia.id,
        NewCategory {
            name: "Bebidas".to_string(),
            description: None,
        },
    )
    .await;
    assert!(other.is_ok());

    assert!(categories::exists_by_name_for_owner(&db, ana.id, "Bebidas")
        .await
        .unwrap());
    assert_eq!(categories::count_for_owner(&db, ana.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_category_creation_yields_one_conflict() {
    let db = setup_test_db().await;
    let ana = create_user(&db, "Ana", "ana@example.com").await;

    let first = categories::create(
        &db,
        ana.id,
        NewCategory {
            name: "Sobremesas".to_string(),
            description: None,
        },
    );
    let second = categories::create(
        &db,
        ana.id,
        NewCategory {
            name: "Sobremesas".to_string(),
            description: None,
        },
    );

    let (first, second) = tokio::join!(first, second);
    let outcomes = [first, second];

    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(RepoError::Conflict(_))))
            .count(),
        1
    );
    assert_eq!(categories::count_for_owner(&db, ana.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_rename_category_to_taken_name_is_conflict() {
    let db = setup_test_db().await;
    let ana = create_user(&db, "Ana", "ana@example.com").await;
    create_category(&db, ana.id, "Lanches").await;
    let pizzas = create_category(&db, ana.id, "Pizzas").await;

    let result = categories::save(
        &db,
        pizzas.id,
        ana.id,
        CategoryChanges {
            name: Some("Lanches".to_string()),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(result, Err(RepoError::Conflict(_))));

    let renamed = categories::save(
        &db,
        pizzas.id,
        ana.id,
        CategoryChanges {
            name: Some("Pizzas Doces".to_string()),
            description: Some(Some("Massa fina".to_string())),
        },
    )
    .await
    .unwrap();
    assert_eq!(renamed.name, "Pizzas Doces");
    assert_eq!(renamed.description.as_deref(), Some("Massa fina"));
}

#[tokio::test]
async fn test_category_lookup_is_owner_scoped() {
    let db = setup_test_db().await;
    let ana = create_user(&db, "Ana", "ana@example.com").await;
    let bia = create_user(&db, "Bia", "bia@example.com").await;
    let bebidas = create_category(&db, ana.id, "Bebidas").await;

    assert!(categories::find_by_id_and_owner(&db, bebidas.id, ana.id)
        .await
        .unwrap()
        .is_some());
    assert!(categories::find_by_id_and_owner(&db, bebidas.id, bia.id)
        .await
        .unwrap()
        .is_none());

    let result = categories::save(&db, bebidas.id, bia.id, CategoryChanges::default()).await;
    assert!(matches!(result, Err(RepoError::NotFound)));

    assert!(!categories::delete_by_id_and_owner(&db, bebidas.id, bia.id)
        .await
        .unwrap());
    assert!(categories::find_all_for_owner(&db, bia.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_product_with_foreign_category_is_not_found() {
    let db = setup_test_db().await;
    let ana = create_user(&db, "Ana", "ana@example.com").await;
    let bia = create_user(&db, "Bia", "bia@example.com").await;
    let anas_category = create_category(&db, ana.id, "Bebidas").await;
    let bias_category = create_category(&db, bia.id, "Bebidas").await;

    let result = products::create(
        &db,
        bia.id,
        new_product("Suco", "7.00", true, Some(anas_category.id)),
    )
    .await;
    assert!(matches!(result, Err(RepoError::NotFound)));

    let suco = products::create(
        &db,
        bia.id,
        new_product("Suco", "7.00", true, Some(bias_category.id)),
    )
    .await
    .unwrap();

    let moved = products::save(
        &db,
        suco.id,
        bia.id,
        ProductChanges {
            category_id: Some(Some(anas_category.id)),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(moved, Err(RepoError::NotFound)));

    let unchanged = products::find_by_id_and_owner(&db, suco.id, bia.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.category_id, Some(bias_category.id));
}

#[tokio::test]
async fn test_product_price_round_trip_is_exact() {
    let db = setup_test_db().await;
    let ana = create_user(&db, "Ana", "ana@example.com").await;
    let lanches = create_category(&db, ana.id, "Lanches").await;

    let created = products::create(
        &db,
        ana.id,
        new_product("X-Burguer", "12.50", true, Some(lanches.id)),
    )
    .await
    .unwrap();

    let fetched = products::find_by_id_and_owner(&db, created.id, ana.id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(fetched.price_cents, 1250);
    assert_eq!(fetched.price(), Decimal::from_str("12.50").unwrap());
    assert_eq!(fetched.price().to_string(), "12.50");
}

#[tokio::test]
async fn test_price_to_cents_rounds_to_two_digits() {
    assert_eq!(
        products::price_to_cents(Decimal::from_str("9.999").unwrap()).unwrap(),
        1000
    );
    assert_eq!(
        products::price_to_cents(Decimal::from_str("0.1").unwrap()).unwrap(),
        10
    );
    assert_eq!(products::price_to_cents(Decimal::ZERO).unwrap(), 0);
}

#[tokio::test]
async fn test_price_to_cents_rounds_half_up() {
    assert_eq!(
        products::price_to_cents(Decimal::from_str("12.345").unwrap()).unwrap(),
        1235
    );
    assert_eq!(
        products::price_to_cents(Decimal::from_str("0.005").unwrap()).unwrap(),
        1
    );
    assert_eq!(
        products::price_to_cents(Decimal::from_str("2.125").unwrap()).unwrap(),
        213
    );
}

#[tokio::test]
async fn test_product_update_and_delete() {
    let db = setup_test_db().await;
    let ana = create_user(&db, "Ana", "ana@example.com").await;
    let bia = create_user(&db, "Bia", "bia@example.com").await;
    let lanches = create_category(&db, ana.id, "Lanches").await;

    let misto = products::create(
        &db,
        ana.id,
        new_product("Misto", "8.00", true, Some(lanches.id)),
    )
    .await
    .unwrap();

    let updated = products::save(
        &db,
        misto.id,
        ana.id,
        ProductChanges {
            price: Some(Decimal::from_str("9.5").unwrap()),
            available: Some(false),
            quantity: Some(Some(4)),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.price().to_string(), "9.50");
    assert!(!updated.available);
    assert_eq!(updated.quantity, Some(4));
    assert_eq!(updated.name, "Misto");

    assert_eq!(products::count_for_owner(&db, ana.id).await.unwrap(), 1);
    assert_eq!(
        products::count_available_for_owner(&db, ana.id).await.unwrap(),
        0
    );

    // Another owner can neither see nor delete it
    assert!(!products::delete_by_id_and_owner(&db, misto.id, bia.id)
        .await
        .unwrap());
    assert!(products::delete_by_id_and_owner(&db, misto.id, ana.id)
        .await
        .unwrap());
    assert!(products::find_by_id_and_owner(&db, misto.id, ana.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_category_delete_blocked_while_it_has_products() {
    let db = setup_test_db().await;
    let ana = create_user(&db, "Ana", "ana@example.com").await;
    let bebidas = create_category(&db, ana.id, "Bebidas").await;
    let vazia = create_category(&db, ana.id, "Vazia").await;

    let agua = products::create(
        &db,
        ana.id,
        new_product("Água", "3.00", true, Some(bebidas.id)),
    )
    .await
    .unwrap();

    let blocked = categories::delete_by_id_and_owner(&db, bebidas.id, ana.id).await;
    assert!(matches!(blocked, Err(RepoError::Conflict(_))));

    assert!(categories::delete_by_id_and_owner(&db, vazia.id, ana.id)
        .await
        .unwrap());

    products::delete_by_id_and_owner(&db, agua.id, ana.id)
        .await
        .unwrap();
    assert!(categories::delete_by_id_and_owner(&db, bebidas.id, ana.id)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_product_counts_per_category() {
    let db = setup_test_db().await;
    let ana = create_user(&db, "Ana", "ana@example.com").await;
    let bebidas = create_category(&db, ana.id, "Bebidas").await;
    let lanches = create_category(&db, ana.id, "Lanches").await;

    for name in ["Água", "Suco"] {
        products::create(&db, ana.id, new_product(name, "4.00", true, Some(bebidas.id)))
            .await
            .unwrap();
    }
    products::create(&db, ana.id, new_product("Avulso", "1.00", true, None))
        .await
        .unwrap();

    let counts = categories::product_counts_for_owner(&db, ana.id).await.unwrap();
    assert_eq!(counts.get(&bebidas.id), Some(&2));
    assert_eq!(counts.get(&lanches.id), None);

    let in_bebidas = products::find_by_category_and_owner(&db, bebidas.id, ana.id)
        .await
        .unwrap();
    assert_eq!(in_bebidas.len(), 2);
    assert_eq!(
        products::find_available_for_owner(&db, ana.id)
            .await
            .unwrap()
            .len(),
        3
    );
    assert_eq!(products::find_all_for_owner(&db, ana.id).await.unwrap().len(), 3);
    assert_eq!(
        products::count_for_category_and_owner(&db, bebidas.id, ana.id)
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn test_find_product_by_name_ignores_case() {
    let db = setup_test_db().await;
    let ana = create_user(&db, "Ana", "ana@example.com").await;
    let bia = create_user(&db, "Bia", "bia@example.com").await;

    let suco = products::create(&db, ana.id, new_product("Suco de Laranja", "7.00", true, None))
        .await
        .unwrap();

    let found = products::find_by_name_for_owner(&db, ana.id, "SUCO DE LARANJA")
        .await
        .unwrap();
    assert_eq!(found.map(|p| p.id), Some(suco.id));

    assert!(products::find_by_name_for_owner(&db, bia.id, "suco de laranja")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_menu_groups_by_category_and_availability() {
    let db = setup_test_db().await;
    let ana = create_user(&db, "Ana", "ana@example.com").await;
    let lanches = create_category(&db, ana.id, "Lanches").await;
    let bebidas = create_category(&db, ana.id, "Bebidas").await;

    products::create(&db, ana.id, new_product("X-Salada", "15.00", true, Some(lanches.id)))
        .await
        .unwrap();
    products::create(&db, ana.id, new_product("X-Bacon", "18.50", true, Some(lanches.id)))
        .await
        .unwrap();
    products::create(&db, ana.id, new_product("Refrigerante", "6.00", false, Some(bebidas.id)))
        .await
        .unwrap();

    let menu = build_menu(&db, ana.id).await;

    assert!(!menu.is_degraded());
    assert_eq!(menu.owner, "Ana");
    assert_eq!(menu.total_products, 3);

    // Categories iterate in name order
    let names: Vec<&str> = menu.categories.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["Bebidas", "Lanches"]);

    let lanches_bucket = &menu.categories["Lanches"];
    assert_eq!(lanches_bucket.available.len(), 2);
    assert!(lanches_bucket.unavailable.is_empty());
    assert_eq!(lanches_bucket.available[0].name, "X-Salada");
    assert_eq!(lanches_bucket.available[1].price, 18.5);

    let bebidas_bucket = &menu.categories["Bebidas"];
    assert!(bebidas_bucket.available.is_empty());
    assert_eq!(bebidas_bucket.unavailable.len(), 1);
    assert_eq!(bebidas_bucket.unavailable[0].name, "Refrigerante");
}

#[tokio::test]
async fn test_menu_skips_uncategorized_and_foreign_products() {
    let db = setup_test_db().await;
    let ana = create_user(&db, "Ana", "ana@example.com").await;
    let bia = create_user(&db, "Bia", "bia@example.com").await;
    let lanches = create_category(&db, ana.id, "Lanches").await;
    let bias_lanches = create_category(&db, bia.id, "Lanches").await;

    products::create(&db, ana.id, new_product("Misto", "8.00", true, Some(lanches.id)))
        .await
        .unwrap();
    products::create(&db, ana.id, new_product("Sem categoria", "1.00", true, None))
        .await
        .unwrap();
    products::create(&db, bia.id, new_product("Coxinha", "5.00", true, Some(bias_lanches.id)))
        .await
        .unwrap();

    let menu = build_menu(&db, ana.id).await;

    assert_eq!(menu.total_products, 1);
    assert_eq!(menu.categories.len(), 1);
    assert_eq!(menu.categories["Lanches"].available[0].name, "Misto");
}

#[tokio::test]
async fn test_menu_for_unknown_owner_is_degraded() {
    let db = setup_test_db().await;

    let menu = build_menu(&db, 4242).await;

    assert!(menu.is_degraded());
    assert!(menu.categories.is_empty());
    assert_eq!(menu.total_products, 0);

    let json = serde_json::to_value(&menu).unwrap();
    assert_eq!(json["error"], "failed to load menu");
}

#[tokio::test]
async fn test_deleting_user_cascades_to_owned_rows_only() {
    let db = setup_test_db().await;
    let ana = create_user(&db, "Ana", "ana@example.com").await;
    let bia = create_user(&db, "Bia", "bia@example.com").await;

    for owner in [&ana, &bia] {
        let cat = create_category(&db, owner.id, "Lanches").await;
        products::create(&db, owner.id, new_product("Misto", "8.00", true, Some(cat.id)))
            .await
            .unwrap();
        products::create(&db, owner.id, new_product("Avulso", "2.00", false, None))
            .await
            .unwrap();
    }

    assert!(users::delete_by_id(&db, ana.id).await.unwrap());
    assert!(!users::delete_by_id(&db, ana.id).await.unwrap());

    assert!(users::find_by_id(&db, ana.id).await.unwrap().is_none());
    assert_eq!(categories::count_for_owner(&db, ana.id).await.unwrap(), 0);
    assert_eq!(products::count_for_owner(&db, ana.id).await.unwrap(), 0);

    assert_eq!(categories::count_for_owner(&db, bia.id).await.unwrap(), 1);
    assert_eq!(products::count_for_owner(&db, bia.id).await.unwrap(), 2);

    assert_eq!(category::Entity::find().count(&db).await.unwrap(), 1);
    assert_eq!(product::Entity::find().count(&db).await.unwrap(), 2);
}
