mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{User, body_json, build_test_app, send};
use dealroom_types::events::NotificationEvent;
use dealroom_types::models::Role;

fn snapshot(username: &str, followers: i64) -> serde_json::Value {
    json!({ "username": username, "total_followers": followers, "engagement_rate": 3.1 })
}

#[tokio::test]
async fn shortlist_two_creators_and_roll_up_spend() {
    let app = build_test_app();
    let brand = User::new(Role::Brand);
    let (maya, theo) = (User::new(Role::Creator), User::new(Role::Creator));

    let response = send(
        &app,
        Method::POST,
        "/campaigns",
        Some(&brand),
        Some(json!({ "name": "Spring drop", "budget": 2000, "goal_reach": 100000 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let campaign = body_json(response).await;
    assert_eq!(campaign["status"], "draft");
    let campaign_id = campaign["id"].as_str().unwrap().to_string();

    let mut sink = app.state.notifier.subscribe();

    for (creator, price, followers) in [(&maya, 500, 30_000), (&theo, 700, 20_000)] {
        let response = send(
            &app,
            Method::POST,
            &format!("/campaigns/{campaign_id}/influencers"),
            Some(&brand),
            Some(json!({
                "creator_id": creator.id,
                "snapshot": snapshot("creator", followers),
                "agreed_price": price,
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let invite = sink.try_recv().unwrap();
    assert_eq!(invite.recipient_id, maya.id);
    assert!(matches!(invite.event, NotificationEvent::CampaignInvite { .. }));
    assert_eq!(sink.try_recv().unwrap().recipient_id, theo.id);

    let aggregates = body_json(
        send(
            &app,
            Method::GET,
            &format!("/campaigns/{campaign_id}/aggregates"),
            Some(&brand),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(aggregates["influencer_count"], 2);
    assert_eq!(aggregates["total_spent"], 1200);
    assert_eq!(aggregates["budget_remaining"], 800);
    assert_eq!(aggregates["total_reach"], 50_000);
    assert_eq!(aggregates["goal_reach_progress"], 0.5);
    assert_eq!(aggregates["by_status"]["shortlisted"], 2);
    assert_eq!(aggregates["by_status"]["declined"], 0);
}

#[tokio::test]
async fn link_lifecycle_is_versioned() {
    let app = build_test_app();
    let brand = User::new(Role::Brand);
    let creator = User::new(Role::Creator);

    let campaign = body_json(
        send(&app, Method::POST, "/campaigns", Some(&brand), Some(json!({ "name": "Fall" }))).await,
    )
    .await;
    let campaign_id = campaign["id"].as_str().unwrap().to_string();

    let attached = body_json(
        send(
            &app,
            Method::POST,
            &format!("/campaigns/{campaign_id}/influencers"),
            Some(&brand),
            Some(json!({ "creator_id": creator.id, "snapshot": snapshot("theo", 900) })),
        )
        .await,
    )
    .await;
    let link_id = attached["link"]["id"].as_str().unwrap().to_string();
    assert!(attached["deal"].is_null());

    let response = send(
        &app,
        Method::PATCH,
        &format!("/campaigns/{campaign_id}/influencers/{link_id}"),
        Some(&brand),
        Some(json!({ "expected_version": 1, "status": "contacted" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["status"], "contacted");
    assert!(updated["contact_date"].is_string());

    let response = send(
        &app,
        Method::DELETE,
        &format!("/campaigns/{campaign_id}/influencers/{link_id}?expected_version=1"),
        Some(&brand),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(
        &app,
        Method::DELETE,
        &format!("/campaigns/{campaign_id}/influencers/{link_id}?expected_version=2"),
        Some(&brand),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn campaigns_belong_to_their_owner() {
    let app = build_test_app();
    let owner = User::new(Role::Brand);
    let rival = User::new(Role::Brand);

    let campaign = body_json(
        send(&app, Method::POST, "/campaigns", Some(&owner), Some(json!({ "name": "Mine" }))).await,
    )
    .await;
    let campaign_id = campaign["id"].as_str().unwrap();

    let response = send(
        &app,
        Method::GET,
        &format!("/campaigns/{campaign_id}"),
        Some(&rival),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        Method::PATCH,
        &format!("/campaigns/{campaign_id}/status"),
        Some(&owner),
        Some(json!({ "status": "active", "expected_version": 1 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "active");

    let listed = body_json(send(&app, Method::GET, "/campaigns", Some(&rival), None).await).await;
    assert!(listed.as_array().unwrap().is_empty());

    let response = send(
        &app,
        Method::GET,
        &format!("/campaigns/{}", uuid::Uuid::new_v4()),
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn creators_cannot_create_campaigns() {
    let app = build_test_app();
    let creator = User::new(Role::Creator);
    let response = send(
        &app,
        Method::POST,
        "/campaigns",
        Some(&creator),
        Some(json!({ "name": "Nope" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
