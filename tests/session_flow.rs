use futures::executor::block_on;
use futures::future::join_all;
use rs_session::{
    AccessControl, Action, Algorithm, Auth, AuthBuilder, Claims, Expiration, JwtConfig,
    ObjectSchema, Principal, PrincipalId, PrincipalProvider, PrincipalRecord, PrincipalResolver,
    ResolverError, Resource, ResourceKind, ResourceRegistry, ResourceSchema, Role, Schema,
    SessionErrorCode, resolver_fn,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const ED_PRIVATE: &str = include_str!("fixtures/ed25519_private.pem");
const ED_PUBLIC: &str = include_str!("fixtures/ed25519_public.pem");

struct TenantAccess {
    tenant: Option<Value>,
}

impl AccessControl for TenantAccess {
    fn is_allowed(&self, resource: &Resource, _action: &Action) -> bool {
        self.tenant.is_some() && resource.attribute("tenantId") == self.tenant.as_ref()
    }
}

fn tenant_access(principal: &Principal) -> TenantAccess {
    TenantAccess {
        tenant: principal.attribute("tenantId").cloned(),
    }
}

fn registry() -> ResourceRegistry {
    ResourceRegistry::new([ResourceSchema::new(
        ResourceKind::try_from("user").unwrap(),
        ObjectSchema::new()
            .field("tenantId", Schema::String)
            .field("public", Schema::Bool),
        [
            Action::try_from("read").unwrap(),
            Action::try_from("update").unwrap(),
        ],
    )])
}

fn principals() -> PrincipalProvider<impl PrincipalResolver> {
    let records: Arc<HashMap<String, PrincipalRecord>> = Arc::new(
        [
            PrincipalRecord::new("account-a")
                .role("member")
                .attributes(json!({"tenantId": "t1"})),
            PrincipalRecord::new("account-b")
                .role("member")
                .attributes(json!({"tenantId": "t2"})),
        ]
        .into_iter()
        .map(|record| (record.id.clone(), record))
        .collect(),
    );
    PrincipalProvider::new(
        [Role::try_from("member").unwrap()],
        ObjectSchema::new().field("tenantId", Schema::String),
        resolver_fn(move |id: PrincipalId| {
            let records = Arc::clone(&records);
            async move { Ok::<_, ResolverError>(records.get(id.as_str()).cloned()) }
        }),
    )
}

fn auth() -> Auth<impl PrincipalResolver, fn(&Principal) -> TenantAccess> {
    let jwt = JwtConfig::new(Algorithm::EdDSA, ED_PRIVATE, ED_PUBLIC, "session-tests", "app");
    AuthBuilder::new(
        principals(),
        registry(),
        tenant_access as fn(&Principal) -> TenantAccess,
        jwt,
    )
    .build()
}

fn claims(id: &str) -> Claims {
    Claims::new(PrincipalId::try_from(id).unwrap())
}

fn read() -> Vec<Action> {
    vec![Action::try_from("read").unwrap()]
}

#[test]
fn generated_token_should_resolve_to_public_projection() {
    let auth = auth();
    let token = auth.generate(claims("account-a"), None).unwrap();

    let resolution = block_on(auth.resolve(&token));
    let session = resolution.session().expect("valid session");

    assert_eq!(session.principal().id().as_str(), "account-a");
    assert_eq!(session.to_json(), json!({"id": "account-a"}));
    assert_eq!(serde_json::to_value(session).unwrap(), json!({"id": "account-a"}));
    assert_eq!(session.token().payload.iss, "session-tests");
}

#[test]
fn tenant_scoped_access_should_follow_principal_attributes() {
    let auth = auth();
    let resource = auth
        .resources()
        .parse("user", "u1", &json!({"tenantId": "t1", "public": true}))
        .unwrap();
    assert_eq!(resource.kind().as_str(), "user");
    assert_eq!(resource.id().as_str(), "u1");
    assert_eq!(
        Value::Object(resource.attr().clone()),
        json!({"tenantId": "t1", "public": true})
    );

    let same_tenant = block_on(auth.resolve(&auth.generate(claims("account-a"), None).unwrap()))
        .into_result()
        .unwrap();
    let other_tenant = block_on(auth.resolve(&auth.generate(claims("account-b"), None).unwrap()))
        .into_result()
        .unwrap();

    let read = Action::try_from("read").unwrap();
    assert!(same_tenant.access().is_allowed(&resource, &read));
    assert!(!other_tenant.access().is_allowed(&resource, &read));
}

#[test]
fn actions_outside_vocabulary_should_be_denied() {
    let auth = auth();
    let resource = auth
        .resources()
        .parse("user", "u1", &json!({"tenantId": "t1", "public": false}))
        .unwrap();
    let session = block_on(auth.resolve(&auth.generate(claims("account-a"), None).unwrap()))
        .into_result()
        .unwrap();

    let check = session.access().check_resource(
        &resource,
        &[
            Action::try_from("read").unwrap(),
            Action::try_from("delete").unwrap(),
        ],
    );

    assert!(check.is_permitted("read"));
    assert!(!check.is_permitted("delete"));
    assert!(!check.all_permitted());
}

#[test]
fn batch_checks_should_keep_input_order() {
    let auth = auth();
    let session = block_on(auth.resolve(&auth.generate(claims("account-a"), None).unwrap()))
        .into_result()
        .unwrap();
    let batch: Vec<_> = ["t2", "t1", "t3", "t1"]
        .iter()
        .enumerate()
        .map(|(i, tenant)| {
            let resource = auth
                .resources()
                .parse("user", format!("u{i}"), &json!({"tenantId": tenant, "public": false}))
                .unwrap();
            (resource, read())
        })
        .collect();

    let checks = session.access().check_resources(&batch);

    assert_eq!(checks.len(), batch.len());
    let ids: Vec<_> = checks.iter().map(|c| c.resource().id().as_str()).collect();
    assert_eq!(ids, ["u0", "u1", "u2", "u3"]);
    let allowed: Vec<_> = checks.iter().map(|c| c.all_permitted()).collect();
    assert_eq!(allowed, [false, true, false, true]);
}

#[test]
fn short_lived_token_should_expire() {
    let auth = auth();
    let token = auth
        .generate(
            claims("account-a"),
            Some(Expiration::try_from("1 second").unwrap()),
        )
        .unwrap();
    assert!(block_on(auth.resolve(&token)).is_valid());

    thread::sleep(Duration::from_millis(2_100));

    let resolution = block_on(auth.resolve(&token));
    assert_eq!(
        resolution.error().map(|err| err.code()),
        Some(SessionErrorCode::TokenExpired)
    );
}

#[test]
fn unknown_subject_should_not_resolve() {
    let auth = auth();
    let token = auth.generate(claims("ghost"), None).unwrap();

    let resolution = block_on(auth.resolve(&token));

    assert!(!resolution.is_valid());
    assert_eq!(
        resolution.error().map(|err| err.code()),
        Some(SessionErrorCode::PrincipalNotFound)
    );
}

#[test]
fn concurrent_resolves_should_share_key_material() {
    let auth = auth();
    let tokens: Vec<_> = ["account-a", "account-b", "account-a", "ghost"]
        .into_iter()
        .map(|id| auth.generate(claims(id), None).unwrap())
        .collect();

    let resolutions = block_on(join_all(tokens.iter().map(|token| auth.resolve(token))));

    let valid: Vec<_> = resolutions.iter().map(|r| r.is_valid()).collect();
    assert_eq!(valid, [true, true, true, false]);
    assert!(auth.keys().pubkey().is_ok());
}

#[cfg(feature = "memory-store")]
#[test]
fn memory_store_should_back_sessions() {
    use rs_session::MemoryPrincipalStore;

    let store = MemoryPrincipalStore::new();
    store.insert(
        PrincipalRecord::new("account-a")
            .role("member")
            .attributes(json!({"tenantId": "t1"})),
    );
    let principals = PrincipalProvider::new(
        [Role::try_from("member").unwrap()],
        ObjectSchema::new().field("tenantId", Schema::String),
        store.clone(),
    );
    let jwt = JwtConfig::new(Algorithm::EdDSA, ED_PRIVATE, ED_PUBLIC, "session-tests", "app");
    let auth = AuthBuilder::new(principals, registry(), tenant_access, jwt).build();
    let token = auth.generate(claims("account-a"), None).unwrap();

    assert!(block_on(auth.resolve(&token)).is_valid());

    store.remove("account-a");
    assert_eq!(
        block_on(auth.resolve(&token)).error().map(|err| err.code()),
        Some(SessionErrorCode::PrincipalNotFound)
    );
}
