//! webOS controller against the fake TV

mod common;

use alarm_monitor::device::{commands, WebOsConfig, WebOsController};
use alarm_monitor::TvController;
use common::FakeTv;
use serde_json::json;

fn controller(tv: &FakeTv) -> WebOsController {
    WebOsController::new(WebOsConfig {
        address: "127.0.0.1".into(),
        port: tv.port,
        client_key: Some("stored-key".into()),
        connect_timeout_secs: 2,
        call_timeout_secs: 2,
        ..WebOsConfig::default()
    })
}

#[tokio::test]
async fn test_screen_state_query() {
    let mut tv = FakeTv::start().await;
    let controller = controller(&tv);

    let (on, _) = tokio::join!(controller.is_screen_on(), async {
        let mut session = tv.next_session().await;
        let register = session.accept_registration().await;
        assert_eq!(register["payload"]["client-key"], "stored-key");

        let query = session.recv().await;
        assert_eq!(query["uri"], commands::GET_POWER_STATE);
        session.reply(&query, json!({"returnValue": true, "state": "Active Standby"}));
    });

    assert!(!on.unwrap());
    controller.disconnect().await;
}

#[tokio::test]
async fn test_turn_off_falls_back_to_system_command() {
    let mut tv = FakeTv::start().await;
    let controller = controller(&tv);

    let (result, _) = tokio::join!(controller.turn_off(), async {
        let mut session = tv.next_session().await;
        session.accept_registration().await;

        let primary = session.recv().await;
        assert_eq!(primary["uri"], commands::TV_POWER_TURN_OFF);
        session.reject(&primary, "404 no such service");

        let fallback = session.recv().await;
        assert_eq!(fallback["uri"], commands::SYSTEM_TURN_OFF);
        session.reply(&fallback, json!({"returnValue": true}));
    });

    result.unwrap();
    controller.disconnect().await;
    assert!(!controller.link().is_ready());
}

#[tokio::test]
async fn test_notify_sends_toast() {
    let mut tv = FakeTv::start().await;
    let controller = controller(&tv);

    let (result, _) = tokio::join!(controller.notify("Alarm 7 active"), async {
        let mut session = tv.next_session().await;
        session.accept_registration().await;

        let toast = session.recv().await;
        assert_eq!(toast["uri"], commands::CREATE_TOAST);
        assert_eq!(toast["payload"]["message"], "Alarm 7 active");
        session.reply(&toast, json!({"returnValue": true}));
    });

    result.unwrap();
    controller.disconnect().await;
}
