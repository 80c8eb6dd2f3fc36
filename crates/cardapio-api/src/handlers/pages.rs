//! Server-rendered HTML screens
//!
//! Plain strings, no template engine. Everything user-controlled goes
//! through [`escape_html`].

use std::fmt::Write as _;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
    Extension, Form,
};
use cardapio_auth::Provider;
use cardapio_db::entities::category;
use cardapio_db::repository::categories::{self, CategoryChanges, NewCategory};
use cardapio_db::repository::{products, users};
use cardapio_db::{build_menu, Menu};
use serde_json::Value;
use tracing::{info, warn};

use super::products::new_product_from;
use super::{non_blank, start_session};
use crate::accounts::{self, AccountError};
use crate::error::ApiError;
use crate::middleware::{clear_cookie, AuthUser, SESSION_COOKIE};
use crate::models::*;
use crate::AppState;

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Text for the `?erro=` codes used by redirects; unknown codes get a
/// generic message so arbitrary input is never echoed.
fn error_message(code: &str) -> &'static str {
    match code {
        "login_falhou" => "Não foi possível entrar. Verifique seus dados.",
        "estado_invalido" => "A sessão de login expirou. Tente novamente.",
        "provedor_indisponivel" => "Este método de login não está disponível.",
        "campos_obrigatorios" => "Preencha todos os campos obrigatórios.",
        "email_em_uso" => "Este email já está cadastrado.",
        "cadastro_desativado" => "Novos cadastros estão desativados.",
        "nome_em_uso" => "Já existe uma categoria com esse nome.",
        "categoria_invalida" => "Categoria não encontrada.",
        "preco_invalido" => "Informe um preço válido.",
        "categoria_com_produtos" => "Remova os produtos da categoria antes de excluí-la.",
        _ => "Algo deu errado. Tente novamente.",
    }
}

fn layout(title: &str, message: Option<&str>, body: &str) -> Html<String> {
    let alert = message
        .map(|code| format!("<p class=\"erro\">{}</p>", escape_html(error_message(code))))
        .unwrap_or_default();

    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"pt-BR\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title} · Cardápio</title>\n</head>\n<body>\n{alert}\n{body}\n</body>\n</html>\n",
        title = escape_html(title),
        alert = alert,
        body = body,
    ))
}

fn nav(user: &AuthUser) -> String {
    format!(
        "<nav>Olá, {} · <a href=\"/dashboard\">Início</a> · <a href=\"/cardapio\">Cardápio</a> · \
         <a href=\"/categorias\">Categorias</a> · <a href=\"/create_product\">Novo produto</a> · \
         <a href=\"/logout\">Sair</a></nav>",
        escape_html(&user.name)
    )
}

fn redirect_with_error(path: &str, code: &str) -> Response {
    Redirect::to(&format!("{}?erro={}", path, code)).into_response()
}

// ============================================================================
// Login and signup
// ============================================================================

pub async fn login_page(
    State(state): State<Arc<AppState>>,
    Query(message): Query<PageMessage>,
) -> Html<String> {
    let mut body = String::from(
        "<h1>Entrar</h1>\n<form method=\"post\" action=\"/login\">\n\
         <label>Email <input type=\"email\" name=\"email\" required></label>\n\
         <label>Senha <input type=\"password\" name=\"senha\" required></label>\n\
         <button type=\"submit\">Entrar</button>\n</form>\n",
    );

    for provider in [Provider::Google, Provider::Facebook] {
        if state.identity_provider(provider).is_some() {
            let _ = writeln!(
                body,
                "<p><a href=\"/login/{}\">Entrar com {}</a></p>",
                provider,
                match provider {
                    Provider::Google => "Google",
                    Provider::Facebook => "Facebook",
                }
            );
        }
    }

    if state.allow_signup {
        body.push_str("<p><a href=\"/cadastro_usuario\">Criar conta</a></p>\n");
    }

    layout("Entrar", message.erro.as_deref(), &body)
}

pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> Response {
    let account = match accounts::login_local(&state.db, Some(&form.email), Some(&form.senha))
        .await
    {
        Ok(account) => account,
        Err(AccountError::Repo(e)) => return ApiError::from(e).into_response(),
        Err(_) => return redirect_with_error("/login", "login_falhou"),
    };

    match start_session(&state, &account) {
        Ok((cookie, _)) => {
            info!(user_id = account.id, "User logged in");
            (
                AppendHeaders([(header::SET_COOKIE, cookie)]),
                Redirect::to("/dashboard"),
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn signup_page(
    State(state): State<Arc<AppState>>,
    Query(message): Query<PageMessage>,
) -> Response {
    if !state.allow_signup {
        return redirect_with_error("/login", "cadastro_desativado");
    }

    let body = "<h1>Criar conta</h1>\n<form method=\"post\" action=\"/cadastro_usuario\">\n\
         <label>Nome <input name=\"nome\" required></label>\n\
         <label>Email <input type=\"email\" name=\"email\" required></label>\n\
         <label>Senha <input type=\"password\" name=\"senha\" required></label>\n\
         <button type=\"submit\">Cadastrar</button>\n</form>\n\
         <p><a href=\"/login\">Já tenho conta</a></p>\n";

    layout("Criar conta", message.erro.as_deref(), body).into_response()
}

pub async fn signup_submit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SignupForm>,
) -> Response {
    if !state.allow_signup {
        return redirect_with_error("/login", "cadastro_desativado");
    }

    let account = match accounts::register(
        &state.db,
        Some(&form.nome),
        Some(&form.email),
        Some(&form.senha),
    )
    .await
    {
        Ok(account) => account,
        Err(AccountError::MissingField(_)) => {
            return redirect_with_error("/cadastro_usuario", "campos_obrigatorios")
        }
        Err(AccountError::EmailTaken) => {
            return redirect_with_error("/cadastro_usuario", "email_em_uso")
        }
        Err(e) => return ApiError::from(e).into_response(),
    };

    match start_session(&state, &account) {
        Ok((cookie, _)) => (
            AppendHeaders([(header::SET_COOKIE, cookie)]),
            Redirect::to("/dashboard"),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn logout_page() -> impl IntoResponse {
    (
        AppendHeaders([(header::SET_COOKIE, clear_cookie(SESSION_COOKIE))]),
        Redirect::to("/login"),
    )
}

// ============================================================================
// Authenticated screens
// ============================================================================

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Html<String>, ApiError> {
    let account = users::get(&state.db, user.user_id).await?;
    let category_count = categories::count_for_owner(&state.db, user.user_id).await?;
    let product_count = products::count_for_owner(&state.db, user.user_id).await?;
    let available_count = products::count_available_for_owner(&state.db, user.user_id).await?;

    let body = format!(
        "{nav}\n<h1>Painel</h1>\n<ul>\n<li>Email: {email}</li>\n\
         <li>Categorias: {categories}</li>\n<li>Produtos: {products}</li>\n\
         <li>Disponíveis: {available}</li>\n</ul>\n",
        nav = nav(&user),
        email = escape_html(&account.email),
        categories = category_count,
        products = product_count,
        available = available_count,
    );

    Ok(layout("Painel", None, &body))
}

fn render_menu(menu: &Menu) -> String {
    let mut html = String::new();

    if menu.is_degraded() {
        html.push_str("<p class=\"erro\">Não foi possível carregar o cardápio.</p>\n");
        return html;
    }
    if menu.categories.is_empty() {
        html.push_str("<p>Nenhum produto cadastrado.</p>\n");
        return html;
    }

    for (name, bucket) in &menu.categories {
        let _ = writeln!(html, "<section>\n<h2>{}</h2>", escape_html(name));
        for (label, items) in [
            ("Disponíveis", &bucket.available),
            ("Indisponíveis", &bucket.unavailable),
        ] {
            if items.is_empty() {
                continue;
            }
            let _ = writeln!(html, "<h3>{}</h3>\n<ul>", label);
            for item in items {
                let _ = write!(
                    html,
                    "<li>{} · R$ {:.2}",
                    escape_html(&item.name),
                    item.price
                );
                if let Some(description) = &item.description {
                    let _ = write!(html, " · {}", escape_html(description));
                }
                html.push_str("</li>\n");
            }
            html.push_str("</ul>\n");
        }
        html.push_str("</section>\n");
    }

    let _ = writeln!(html, "<p>Total: {} produtos</p>", menu.total_products);
    html
}

pub async fn menu_page(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Html<String> {
    let menu = build_menu(&state.db, user.user_id).await;

    let body = format!(
        "{}\n<h1>Cardápio</h1>\n<p>Atualizado em {}</p>\n{}",
        nav(&user),
        menu.generated_at.format(MENU_TIMESTAMP_FORMAT),
        render_menu(&menu)
    );

    layout("Cardápio", None, &body)
}

pub async fn categories_page(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(message): Query<PageMessage>,
) -> Result<Html<String>, ApiError> {
    let rows = categories::find_all_for_owner(&state.db, user.user_id).await?;
    let counts = categories::product_counts_for_owner(&state.db, user.user_id).await?;

    let mut body = format!("{}\n<h1>Categorias</h1>\n<ul>\n", nav(&user));
    for category in &rows {
        let _ = write!(
            body,
            "<li>{} ({} produtos)",
            escape_html(&category.name),
            counts.get(&category.id).copied().unwrap_or(0)
        );
        if let Some(description) = &category.description {
            let _ = write!(body, " · {}", escape_html(description));
        }
        let _ = write!(
            body,
            " · <a href=\"/edit_categoria/{id}\">Editar</a>\
             <form method=\"post\" action=\"/delete_categoria/{id}\" style=\"display:inline\">\
             <button type=\"submit\">Excluir</button></form>",
            id = category.id
        );
        body.push_str("</li>\n");
    }
    body.push_str(
        "</ul>\n<h2>Nova categoria</h2>\n<form method=\"post\" action=\"/categorias\">\n\
         <label>Nome <input name=\"nome\" required></label>\n\
         <label>Descrição <input name=\"descricao\"></label>\n\
         <button type=\"submit\">Criar</button>\n</form>\n",
    );

    Ok(layout("Categorias", message.erro.as_deref(), &body))
}

pub async fn categories_submit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Form(form): Form<CategoryForm>,
) -> Response {
    create_category_from(&state, &user, form, "/categorias").await
}

/// Create a category from a form, sending errors back to `form_path`
async fn create_category_from(
    state: &AppState,
    user: &AuthUser,
    form: CategoryForm,
    form_path: &str,
) -> Response {
    let Some(name) = non_blank(Some(&form.nome)) else {
        return redirect_with_error(form_path, "campos_obrigatorios");
    };

    match categories::create(
        &state.db,
        user.user_id,
        NewCategory {
            name,
            description: non_blank(Some(&form.descricao)),
        },
    )
    .await
    {
        Ok(created) => {
            info!(user_id = user.user_id, category_id = created.id, "Created category");
            Redirect::to("/categorias").into_response()
        }
        Err(e) if e.is_conflict() => redirect_with_error(form_path, "nome_em_uso"),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Category form, empty for a new category or filled for an edit
fn category_form(
    user: &AuthUser,
    existing: Option<&category::Model>,
    erro: Option<&str>,
) -> Html<String> {
    let (title, action, name, description) = match existing {
        Some(c) => (
            "Editar categoria",
            format!("/edit_categoria/{}", c.id),
            escape_html(&c.name),
            escape_html(c.description.as_deref().unwrap_or_default()),
        ),
        None => (
            "Nova categoria",
            "/create_categoria".to_string(),
            String::new(),
            String::new(),
        ),
    };

    let body = format!(
        "{nav}\n<h1>{title}</h1>\n<form method=\"post\" action=\"{action}\">\n\
         <label>Nome <input name=\"nome\" value=\"{name}\" required></label>\n\
         <label>Descrição <input name=\"descricao\" value=\"{description}\"></label>\n\
         <button type=\"submit\">Salvar</button>\n</form>\n\
         <p><a href=\"/categorias\">Voltar</a></p>\n",
        nav = nav(user),
    );

    layout(title, erro, &body)
}

pub async fn create_category_page(
    Extension(user): Extension<AuthUser>,
    Query(message): Query<PageMessage>,
) -> Html<String> {
    category_form(&user, None, message.erro.as_deref())
}

pub async fn create_category_submit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Form(form): Form<CategoryForm>,
) -> Response {
    create_category_from(&state, &user, form, "/create_categoria").await
}

pub async fn edit_category_page(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Query(message): Query<PageMessage>,
) -> Response {
    match categories::find_by_id_and_owner(&state.db, id, user.user_id).await {
        Ok(Some(existing)) => {
            category_form(&user, Some(&existing), message.erro.as_deref()).into_response()
        }
        Ok(None) => redirect_with_error("/categorias", "categoria_invalida"),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn edit_category_submit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Form(form): Form<CategoryForm>,
) -> Response {
    let form_path = format!("/edit_categoria/{}", id);
    let Some(name) = non_blank(Some(&form.nome)) else {
        return redirect_with_error(&form_path, "campos_obrigatorios");
    };

    let changes = CategoryChanges {
        name: Some(name),
        description: Some(non_blank(Some(&form.descricao))),
    };

    match categories::save(&state.db, id, user.user_id, changes).await {
        Ok(_) => {
            info!(user_id = user.user_id, category_id = id, "Updated category");
            Redirect::to("/categorias").into_response()
        }
        Err(cardapio_db::RepoError::NotFound) => {
            redirect_with_error("/categorias", "categoria_invalida")
        }
        Err(e) if e.is_conflict() => redirect_with_error(&form_path, "nome_em_uso"),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn delete_category_submit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> Response {
    match categories::delete_by_id_and_owner(&state.db, id, user.user_id).await {
        Ok(true) => {
            info!(user_id = user.user_id, category_id = id, "Deleted category");
            Redirect::to("/categorias").into_response()
        }
        Ok(false) => redirect_with_error("/categorias", "categoria_invalida"),
        Err(e) if e.is_conflict() => redirect_with_error("/categorias", "categoria_com_produtos"),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn create_product_page(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(message): Query<PageMessage>,
) -> Result<Html<String>, ApiError> {
    let rows = categories::find_all_for_owner(&state.db, user.user_id).await?;

    let mut body = format!("{}\n<h1>Novo produto</h1>\n", nav(&user));
    if rows.is_empty() {
        body.push_str("<p>Crie uma <a href=\"/categorias\">categoria</a> antes.</p>\n");
        return Ok(layout("Novo produto", message.erro.as_deref(), &body));
    }

    body.push_str(
        "<form method=\"post\" action=\"/create_product\">\n\
         <label>Nome <input name=\"nome\" required></label>\n\
         <label>Preço <input name=\"preco\" inputmode=\"decimal\" required></label>\n\
         <label>Categoria <select name=\"categoria_id\">\n",
    );
    for category in &rows {
        let _ = writeln!(
            body,
            "<option value=\"{}\">{}</option>",
            category.id,
            escape_html(&category.name)
        );
    }
    body.push_str(
        "</select></label>\n\
         <label>Quantidade <input type=\"number\" name=\"quantidade\" min=\"0\"></label>\n\
         <label>Descrição <input name=\"descricao\"></label>\n\
         <label><input type=\"checkbox\" name=\"disponivel\" value=\"on\" checked> Disponível</label>\n\
         <button type=\"submit\">Salvar</button>\n</form>\n",
    );

    Ok(layout("Novo produto", message.erro.as_deref(), &body))
}

pub async fn create_product_submit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Form(form): Form<ProductForm>,
) -> Response {
    let request = ProductRequest {
        name: Some(form.nome),
        price: non_blank(Some(&form.preco)).map(Value::String),
        category_id: form.categoria_id.trim().parse().ok(),
        available: Some(form.disponivel.is_some()),
        description: Some(form.descricao),
        quantity: form.quantidade.trim().parse().ok(),
    };

    let new_product = match new_product_from(request) {
        Ok(new_product) => new_product,
        Err(ApiError::Validation(detail)) if detail.contains("price") => {
            return redirect_with_error("/create_product", "preco_invalido")
        }
        Err(_) => return redirect_with_error("/create_product", "campos_obrigatorios"),
    };

    match products::create(&state.db, user.user_id, new_product).await {
        Ok(product) => {
            info!(user_id = user.user_id, product_id = product.id, "Created product");
            Redirect::to("/cardapio").into_response()
        }
        Err(cardapio_db::RepoError::NotFound) => {
            warn!(user_id = user.user_id, "Product form named a foreign category");
            redirect_with_error("/create_product", "categoria_invalida")
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}
