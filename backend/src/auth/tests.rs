use super::*;
use axum::http::{Request, header::AUTHORIZATION};
use jsonwebtoken::{EncodingKey, Header, encode};

const SECRET: &str = "supersecretjwtsecretforunittesting123";
const MEMBER_ID: &str = "123e4567-e89b-12d3-a456-426614174000";

fn claims(role: &str, exp: usize) -> SupabaseClaims {
    SupabaseClaims {
        sub: MEMBER_ID.to_string(),
        role: role.to_string(),
        email: Some("member@example.com".to_string()),
        exp,
    }
}

/// Supabase puts the role in `aud` as well.
fn token_for(claims: &SupabaseClaims, secret: &str) -> String {
    let mut body = serde_json::to_value(claims).unwrap();
    body["aud"] = serde_json::Value::String(claims.role.clone());

    encode(
        &Header::default(),
        &body,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn parts_with(authorization: Option<String>, secret: Option<&str>) -> Parts {
    let mut builder = Request::builder().uri("/api/v1/credits");
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    let (mut parts, _) = builder.body(()).unwrap().into_parts();
    if let Some(secret) = secret {
        parts.extensions.insert(JwtSecret::new(secret));
    }
    parts
}

#[test]
fn test_validate_supabase_jwt_success() {
    let my_claims = claims("authenticated", 9999999999);
    let token = token_for(&my_claims, SECRET);

    let decoded = validate_supabase_jwt(&token, SECRET).expect("Valid token should pass");
    assert_eq!(decoded.sub, my_claims.sub);
    assert_eq!(decoded.email, my_claims.email);
}

#[test]
fn test_validate_supabase_jwt_expired() {
    let token = token_for(&claims("authenticated", 1), SECRET);

    assert!(validate_supabase_jwt(&token, SECRET).is_err());
}

#[test]
fn test_validate_supabase_jwt_invalid_signature() {
    let token = token_for(&claims("authenticated", 9999999999), "wrongsecret");

    assert!(validate_supabase_jwt(&token, SECRET).is_err());
}

#[tokio::test]
async fn extractor_reads_member_from_bearer_token() {
    let token = token_for(&claims(SERVICE_ROLE, 9999999999), SECRET);
    let mut parts = parts_with(Some(format!("Bearer {token}")), Some(SECRET));

    let user = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();

    assert_eq!(user.user_id, Uuid::parse_str(MEMBER_ID).unwrap());
    assert!(user.is_service_role());
}

#[tokio::test]
async fn extractor_rejects_missing_header() {
    let mut parts = parts_with(None, Some(SECRET));

    let (status, _) = AuthUser::from_request_parts(&mut parts, &())
        .await
        .unwrap_err();

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn extractor_rejects_non_bearer_scheme() {
    let mut parts = parts_with(Some("Basic abc".to_string()), Some(SECRET));

    let (status, _) = AuthUser::from_request_parts(&mut parts, &())
        .await
        .unwrap_err();

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
