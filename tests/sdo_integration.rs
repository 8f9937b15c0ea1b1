//! Authenticated-portal integration tests against a mock server.
//!
//! Covers the full handshake and everything that rides on it:
//! - sign-in success and failure signalled by the landing URL
//! - the delegated SDO login and cookie continuity across requests
//! - gateway calls with fresh tokens (notifications, conversations)
//! - roster and profile scraping over the authenticated session

use assert_json_diff::assert_json_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tusur::{Authenticator, Credentials, Directory, Endpoints, Error, Messaging, RosterQuery};

const SESSKEY: &str = "o0mYe6JvbW";
const USER_ID: u64 = 31702;

fn endpoints(server: &MockServer) -> Endpoints {
    Endpoints {
        portal: server.uri(),
        sdo: server.uri(),
    }
}

fn creds() -> Credentials {
    Credentials::new("student@tusur.ru", "hunter2")
}

/// An SDO page body with the inline config both token extractors read.
fn sdo_page_body() -> String {
    format!(
        r#"<html><head><script>
        var M = {{}}; M.cfg = {{"wwwroot":"nope","sesskey":"{SESSKEY}",
        "sessiontimeout":"28800","contextInstanceId":{USER_ID},"themerev":339}};
        </script></head><body></body></html>"#
    )
}

async fn mount_portal_login(server: &MockServer) {
    let dashboard = format!("{}/en/dashboard", server.uri());
    Mock::given(method("POST"))
        .and(path("/en/users/sign_in"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", dashboard.as_str()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/en/dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>dashboard</html>"))
        .mount(server)
        .await;
}

async fn mount_delegated_login(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/en/users/sign_in"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>sdo entry</html>"))
        .mount(server)
        .await;
}

async fn mount_login(server: &MockServer) {
    mount_portal_login(server).await;
    mount_delegated_login(server).await;
}

async fn login(server: &MockServer) -> Authenticator {
    Authenticator::login_with(endpoints(server), creds())
        .await
        .expect("login handshake should succeed")
}

// ── Handshake ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn login_lands_on_the_dashboard() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    let auth = login(&server).await;
    assert_eq!(auth.endpoints().portal, server.uri());
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let server = MockServer::start().await;
    // Wrong credentials re-render the form with a 200 and no redirect.
    Mock::given(method("POST"))
        .and(path("/en/users/sign_in"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<form>sign in</form>"))
        .mount(&server)
        .await;

    let err = Authenticator::login_with(endpoints(&server), creds())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AuthorizationFailed));
    assert!(err.to_string().contains("email and password"));
}

#[tokio::test]
async fn login_issues_the_delegated_sdo_login() {
    let server = MockServer::start().await;
    let entry = format!("{}/auth/edu/?id=1", server.uri());
    Mock::given(method("GET"))
        .and(path("/en/users/sign_in"))
        .and(query_param("redirect_url", entry.as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    mount_portal_login(&server).await;

    login(&server).await;
}

#[tokio::test]
async fn session_cookie_rides_across_the_redirect() {
    let server = MockServer::start().await;
    let dashboard = format!("{}/en/dashboard", server.uri());
    Mock::given(method("POST"))
        .and(path("/en/users/sign_in"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", dashboard.as_str())
                .insert_header("set-cookie", "portal_session=secret1; Path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/en/dashboard"))
        .and(header("cookie", "portal_session=secret1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    mount_delegated_login(&server).await;

    login(&server).await;
}

// ── Messaging ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn notifications_use_fresh_tokens_from_the_popup_page() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/message/output/popup/notifications.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sdo_page_body()))
        .mount(&server)
        .await;

    let notification = json!({
        "id": 9001,
        "subject": "Положительная оценка",
        "timecreatedpretty": "5 ч. 13 мин.",
        "read": false
    });
    Mock::given(method("POST"))
        .and(path("/lib/ajax/service.php"))
        .and(query_param("sesskey", SESSKEY))
        .and(query_param("info", "message_popup_get_popup_notifications"))
        .and(body_json(json!([{
            "index": 0,
            "methodname": "message_popup_get_popup_notifications",
            "args": {"limit": 1000, "offset": 0, "useridto": USER_ID}
        }])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "error": false,
            "data": {"notifications": [notification], "unreadcount": 1}
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let auth = login(&server).await;
    let envelopes = Messaging::new(&auth).notifications().await.unwrap();
    assert_eq!(envelopes.len(), 1);
    assert_json_eq!(
        envelopes[0]["data"]["notifications"][0]["subject"],
        json!("Положительная оценка")
    );
}

#[tokio::test]
async fn conversations_send_the_explicit_null_type_filter() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/message/index.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sdo_page_body()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/lib/ajax/service.php"))
        .and(query_param("info", "core_message_get_conversations"))
        .and(body_json(json!([{
            "index": 0,
            "methodname": "core_message_get_conversations",
            "args": {
                "favourites": false,
                "limitfrom": 0,
                "limitnum": 51,
                "type": null,
                "userid": USER_ID
            }
        }])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "error": null,
            "data": {"conversations": []}
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let auth = login(&server).await;
    let envelopes = Messaging::new(&auth).conversations().await.unwrap();
    assert_eq!(envelopes.len(), 1);
}

#[tokio::test]
async fn envelope_errors_surface_as_remote_errors() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/message/output/popup/notifications.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sdo_page_body()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/lib/ajax/service.php"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"error": "Invalid sesskey", "data": null}])),
        )
        .mount(&server)
        .await;

    let auth = login(&server).await;
    let err = Messaging::new(&auth).notifications().await.unwrap_err();
    assert!(matches!(err, Error::Remote(ref msg) if msg == "Invalid sesskey"));
}

#[tokio::test]
async fn gateway_requires_a_success_status() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/message/output/popup/notifications.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sdo_page_body()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/lib/ajax/service.php"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upgrade in progress"))
        .mount(&server)
        .await;

    let auth = login(&server).await;
    let err = Messaging::new(&auth).notifications().await.unwrap_err();
    assert!(matches!(err, Error::UnexpectedStatus { status: 500, .. }));
}

#[tokio::test]
async fn token_extraction_fails_closed_on_expired_pages() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    // An expired session serves a login stub without the inline config.
    Mock::given(method("GET"))
        .and(path("/message/output/popup/notifications.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Please log in</html>"))
        .mount(&server)
        .await;

    let auth = login(&server).await;
    let err = Messaging::new(&auth).notifications().await.unwrap_err();
    assert!(matches!(err, Error::TokenNotFound("sesskey")));
}

// ── Directory ───────────────────────────────────────────────────────────────

const ROSTER_PAGE: &str = r#"
<table id="participants" class="flexible generaltable">
  <tbody>
    <tr id="user-index-participants-1729_r0">
      <th class="cell c0">
        <a href="/user/view.php?id=31702&amp;course=1729">
          <img class="userpicture" src="/theme/image.php/f2" alt="">
          Никита Исайченко
        </a>
      </th>
      <td class="cell c1">Студент</td>
      <td class="cell c2">571-2</td>
      <td class="cell c3">13 дн.</td>
    </tr>
    <tr id="user-index-participants-1729_r1">
      <td class="cell c0">Итого участников: 1</td>
    </tr>
  </tbody>
</table>
"#;

#[tokio::test]
async fn roster_filters_ride_the_query_string() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/user/index.php"))
        .and(query_param("id", "1729"))
        .and(query_param("tilast", "И"))
        .and(query_param("perpage", "5000"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ROSTER_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let auth = login(&server).await;
    let query = RosterQuery {
        surname: Some("И".to_string()),
        per_page: Some(5000),
        ..RosterQuery::default()
    };
    let roster = Directory::new(&auth).participants(1729, &query).await.unwrap();

    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].name, "Никита Исайченко");
    assert_eq!(roster[0].role.as_deref(), Some("Студент"));
    assert_eq!(roster[0].group.as_deref(), Some("571-2"));
    assert!(roster[0].profile_url.ends_with("/user/view.php?id=31702&course=1729"));
}

#[tokio::test]
async fn profile_fetch_reads_the_labeled_card() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    let profile_page = r#"
<html><body>
<h1>Никита Исайченко</h1>
<div class="profile_tree">
  <dl><dt>Адрес электронной почты</dt>
      <dd><a href="mailto:student@tusur.ru">student@tusur.ru</a></dd></dl>
  <dl><dt>Страна</dt><dd>Россия</dd></dl>
  <dl><dt>Город</dt><dd>Томск</dd></dl>
</div>
</body></html>
"#;
    Mock::given(method("GET"))
        .and(path("/user/profile.php"))
        .and(query_param("id", "31702"))
        .respond_with(ResponseTemplate::new(200).set_body_string(profile_page))
        .mount(&server)
        .await;

    let auth = login(&server).await;
    let profile = Directory::new(&auth).profile(31702).await.unwrap();

    assert_eq!(profile.name, "Никита Исайченко");
    assert_eq!(profile.email.as_deref(), Some("student@tusur.ru"));
    assert_eq!(profile.country.as_deref(), Some("Россия"));
    assert_eq!(profile.timezone, None);
}

#[tokio::test]
async fn roster_error_statuses_are_not_scraped() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/user/index.php"))
        .respond_with(ResponseTemplate::new(503).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let auth = login(&server).await;
    let err = Directory::new(&auth)
        .participants(1729, &RosterQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnexpectedStatus { status: 503, .. }));
}
