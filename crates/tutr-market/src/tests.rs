//! Service tests against an in-memory `SqliteStore`.

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use serde_json::{Value, json};
use tutr_core::{
  chat::split_highlight,
  identity::IdentityProvider,
  key::{Key, SessionId, UserId},
  offer::{NewOffer, OfferKind},
  path::{RecordPath, scheme},
  session::{Decision, SessionRecord, SessionRequest, SessionStatus},
  store::{RecordStore, Subscription, WriteBatch},
  user::{Profile, Role, User},
};
use tutr_store_sqlite::SqliteStore;

use crate::{
  ConsistencyWarning, Error, ErrorClass, Market, MarketConfig, ReplicaLocation,
  messaging::inbox,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

struct Fixture {
  store:   Arc<SqliteStore>,
  market:  Market<SqliteStore>,
  tutor:   UserId,
  student: UserId,
}

fn id(raw: &str) -> UserId { raw.parse().unwrap() }

fn profile(name: &str) -> Profile {
  Profile {
    name:          name.into(),
    age:           24,
    university:    "ku".into(),
    study_line:    "math".into(),
    email:         format!("{}@example.com", name.to_lowercase()),
    profile_image: None,
  }
}

async fn seed<S: RecordStore>(market: &Market<S>) {
  market
    .users()
    .register(id("T1"), Role::Tutor, profile("Ada"))
    .await
    .unwrap();
  market
    .users()
    .register(id("S1"), Role::Student, profile("Sofie"))
    .await
    .unwrap();
}

async fn fixture_with(config: MarketConfig) -> Fixture {
  let store = Arc::new(SqliteStore::open_in_memory().await.expect("in-memory store"));
  let market = Market::new(Arc::clone(&store), config);
  seed(&market).await;
  Fixture { store, market, tutor: id("T1"), student: id("S1") }
}

async fn fixture() -> Fixture { fixture_with(MarketConfig::default()).await }

fn calculus_request() -> SessionRequest {
  SessionRequest::new("S1", "T1", "2024-06-01", "14:30", "Need help with calculus.")
    .unwrap()
}

impl Fixture {
  async fn replica(&self, role: Role, session_id: &SessionId) -> Option<SessionRecord> {
    let user = match role {
      Role::Tutor => &self.tutor,
      Role::Student => &self.student,
    };
    self
      .store
      .get(scheme::user_session(role, user, session_id))
      .await
      .unwrap()
      .map(|v| serde_json::from_value(v).unwrap())
  }

  async fn global(&self, session_id: &SessionId) -> Option<SessionRecord> {
    self
      .store
      .get(scheme::global_session(session_id))
      .await
      .unwrap()
      .map(|v| serde_json::from_value(v).unwrap())
  }

  async fn everything(&self) -> Option<Value> {
    self.store.get(RecordPath::root()).await.unwrap()
  }

  async fn request(&self) -> SessionId {
    self
      .market
      .sessions()
      .request_session(calculus_request())
      .await
      .unwrap()
  }
}

// ─── Creation ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn request_writes_identical_pending_replicas() {
  let f = fixture().await;
  let session_id = f.request().await;

  let tutor = f.replica(Role::Tutor, &session_id).await.unwrap();
  let student = f.replica(Role::Student, &session_id).await.unwrap();
  let global = f.global(&session_id).await.unwrap();

  assert_eq!(tutor, student);
  assert_eq!(tutor, global);
  assert_eq!(tutor.status, SessionStatus::Pending);
  assert_eq!(tutor.student_id, f.student);
  assert_eq!(tutor.tutor_id, f.tutor);
  assert_eq!(tutor.date_label(), "2024-06-01");
  assert_eq!(tutor.time_label(), "14:30");
  assert_eq!(tutor.message, "Need help with calculus.");
}

#[tokio::test]
async fn returned_id_is_the_replica_key() {
  let f = fixture().await;
  let session_id = f.request().await;

  let tutor_sessions = f
    .store
    .get(scheme::user_sessions(Role::Tutor, &f.tutor))
    .await
    .unwrap()
    .unwrap();
  let keys: Vec<&String> = tutor_sessions.as_object().unwrap().keys().collect();
  assert_eq!(keys, [session_id.as_str()]);

  let student_sessions = f
    .store
    .get(scheme::user_sessions(Role::Student, &f.student))
    .await
    .unwrap()
    .unwrap();
  assert!(student_sessions.get(session_id.as_str()).is_some());
}

#[tokio::test]
async fn request_notifies_the_tutor_inbox() {
  let f = fixture().await;
  f.request().await;

  let messages = f
    .market
    .messaging()
    .history(&inbox(&f.tutor), &f.tutor)
    .await
    .unwrap();
  assert_eq!(messages.len(), 1);
  let message = &messages[0].record;
  assert!(message.text.contains("2024-06-01"));
  assert!(message.text.contains("14:30"));
  assert_eq!(message.sender_id.as_ref(), Some(&f.student));
  assert_eq!(message.sender_name.as_deref(), Some("Sofie"));

  let (banner, body) = split_highlight(&message.text);
  assert!(banner.unwrap().starts_with("Sofie requested a session"));
  assert_eq!(body, "Need help with calculus.");
}

#[tokio::test]
async fn blank_message_writes_nothing() {
  let f = fixture().await;
  let before = f.everything().await;

  let mut request = calculus_request();
  request.message = " \t\n".into();
  let err = f.market.sessions().request_session(request).await.unwrap_err();

  assert!(matches!(err, Error::Core(tutr_core::Error::EmptyMessage)));
  assert_eq!(err.class(), ErrorClass::Validation);
  assert_eq!(f.everything().await, before);
}

#[tokio::test]
async fn unknown_tutor_writes_nothing() {
  let f = fixture().await;
  let before = f.everything().await;

  let mut request = calculus_request();
  request.tutor_id = id("T404");
  let err = f.market.sessions().request_session(request).await.unwrap_err();

  assert!(matches!(&err, Error::TutorNotFound(t) if t.as_str() == "T404"));
  assert_eq!(err.class(), ErrorClass::NotFound);
  assert_eq!(f.everything().await, before);
}

#[tokio::test]
async fn a_student_id_is_not_a_tutor() {
  let f = fixture().await;
  let mut request = calculus_request();
  request.tutor_id = f.student.clone();
  let err = f.market.sessions().request_session(request).await.unwrap_err();
  assert!(matches!(err, Error::TutorNotFound(_)));
}

#[tokio::test]
async fn unknown_student_is_rejected() {
  let f = fixture().await;
  let mut request = calculus_request();
  request.student_id = id("S404");
  let err = f.market.sessions().request_session(request).await.unwrap_err();
  assert!(matches!(err, Error::StudentNotFound(_)));
}

#[tokio::test]
async fn global_replica_can_be_disabled() {
  let f = fixture_with(MarketConfig { global_replica: false, ..Default::default() }).await;
  let session_id = f.request().await;

  assert!(f.replica(Role::Tutor, &session_id).await.is_some());
  assert!(f.replica(Role::Student, &session_id).await.is_some());
  assert!(f.global(&session_id).await.is_none());

  let err = f.market.sessions().subscribe_global(&f.student).await.err().unwrap();
  assert!(matches!(err, Error::GlobalReplicaDisabled));
}

// ─── Transitions ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn accept_updates_every_replica() {
  let f = fixture().await;
  let session_id = f.request().await;

  let status = f
    .market
    .sessions()
    .respond_to_session(&session_id, &f.tutor, Decision::Accept)
    .await
    .unwrap();
  assert_eq!(status, SessionStatus::Accepted);

  let tutor = f.replica(Role::Tutor, &session_id).await.unwrap();
  assert_eq!(tutor.status, SessionStatus::Accepted);
  assert!(tutor.responded_at.is_some());
  assert_eq!(f.replica(Role::Student, &session_id).await.unwrap(), tutor);
  assert_eq!(f.global(&session_id).await.unwrap(), tutor);
}

#[tokio::test]
async fn student_feed_observes_acceptance() {
  let f = fixture().await;
  let session_id = f.request().await;

  let mut feed = f
    .market
    .sessions()
    .subscribe_to_my_sessions(&f.student, Role::Student)
    .await
    .unwrap();
  let initial = feed.current().unwrap();
  assert_eq!(initial.len(), 1);
  assert_eq!(initial[0].record.status, SessionStatus::Pending);

  f.market
    .sessions()
    .respond_to_session(&session_id, &f.tutor, Decision::Accept)
    .await
    .unwrap();

  let next = tokio::time::timeout(Duration::from_secs(1), feed.next())
    .await
    .expect("one notification cycle")
    .unwrap();
  assert_eq!(next.len(), 1);
  assert_eq!(next[0].session_id, session_id);
  assert_eq!(next[0].record.status, SessionStatus::Accepted);
}

#[tokio::test]
async fn reject_marks_every_replica_and_deletes_nothing() {
  let f = fixture().await;
  let session_id = f.request().await;

  let status = f
    .market
    .sessions()
    .respond_to_session(&session_id, &f.tutor, Decision::Reject)
    .await
    .unwrap();
  assert_eq!(status, SessionStatus::Rejected);

  for record in [
    f.replica(Role::Tutor, &session_id).await,
    f.replica(Role::Student, &session_id).await,
    f.global(&session_id).await,
  ] {
    assert_eq!(record.expect("replica kept").status, SessionStatus::Rejected);
  }
}

#[tokio::test]
async fn terminal_status_never_changes() {
  let f = fixture().await;
  let sessions = f.market.sessions();
  let session_id = f.request().await;

  sessions
    .respond_to_session(&session_id, &f.tutor, Decision::Accept)
    .await
    .unwrap();
  let after_accept = f.everything().await;

  let err = sessions
    .respond_to_session(&session_id, &f.tutor, Decision::Reject)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::AlreadyResolved { status: SessionStatus::Accepted, .. }
  ));
  assert_eq!(err.class(), ErrorClass::Conflict);

  let repeated = sessions
    .respond_to_session(&session_id, &f.tutor, Decision::Accept)
    .await
    .unwrap();
  assert_eq!(repeated, SessionStatus::Accepted);
  assert_eq!(f.everything().await, after_accept);
}

#[tokio::test]
async fn racing_responses_resolve_once() {
  let f = fixture().await;
  let sessions = f.market.sessions();
  let session_id = f.request().await;

  let (accept, reject) = tokio::join!(
    sessions.respond_to_session(&session_id, &f.tutor, Decision::Accept),
    sessions.respond_to_session(&session_id, &f.tutor, Decision::Reject),
  );
  let winner = match (accept, reject) {
    (Ok(status), Err(Error::AlreadyResolved { .. })) => status,
    (Err(Error::AlreadyResolved { .. }), Ok(status)) => status,
    other => panic!("expected exactly one winner, got {other:?}"),
  };

  let tutor = f.replica(Role::Tutor, &session_id).await.unwrap();
  assert_eq!(tutor.status, winner);
  assert_eq!(f.replica(Role::Student, &session_id).await.unwrap().status, winner);
}

#[tokio::test]
async fn only_the_tutor_may_respond() {
  let f = fixture().await;
  let session_id = f.request().await;

  let err = f
    .market
    .sessions()
    .respond_to_session(&session_id, &f.student, Decision::Accept)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotSessionTutor { .. }));
  assert_eq!(err.class(), ErrorClass::Forbidden);

  f.market
    .users()
    .register(id("T2"), Role::Tutor, profile("Grace"))
    .await
    .unwrap();
  let err = f
    .market
    .sessions()
    .respond_to_session(&session_id, &id("T2"), Decision::Accept)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SessionNotFound(_)));

  assert_eq!(
    f.replica(Role::Tutor, &session_id).await.unwrap().status,
    SessionStatus::Pending
  );
}

#[tokio::test]
async fn responding_to_unknown_session_is_not_found() {
  let f = fixture().await;
  let err = f
    .market
    .sessions()
    .respond_to_session(&"nope".parse().unwrap(), &f.tutor, Decision::Accept)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SessionNotFound(_)));
}

// ─── Read model ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn sessions_are_listed_newest_first() {
  let f = fixture().await;
  let first = f.request().await;
  let second = f.request().await;

  let listed = f
    .market
    .sessions()
    .list_my_sessions(&f.tutor, Role::Tutor)
    .await
    .unwrap();
  let ids: Vec<&SessionId> = listed.iter().map(|s| &s.session_id).collect();
  assert_eq!(ids, [&second, &first]);
}

#[tokio::test]
async fn global_feed_only_shows_own_sessions() {
  let f = fixture().await;
  f.market
    .users()
    .register(id("S2"), Role::Student, profile("Mira"))
    .await
    .unwrap();
  let mine = f.request().await;
  let theirs = SessionRequest::new("S2", "T1", "2024-06-02", "09:00", "Statistics")
    .unwrap();
  f.market.sessions().request_session(theirs).await.unwrap();

  let mut feed = f.market.sessions().subscribe_global(&f.student).await.unwrap();
  let visible = feed.current().unwrap();
  assert_eq!(visible.len(), 1);
  assert_eq!(visible[0].session_id, mine);
}

#[tokio::test]
async fn feed_reports_incremental_changes() {
  let f = fixture().await;
  let mut feed = f
    .market
    .sessions()
    .subscribe_to_my_sessions(&f.tutor, Role::Tutor)
    .await
    .unwrap();
  assert!(feed.current().unwrap().is_empty());

  let session_id = f.request().await;
  let change = tokio::time::timeout(Duration::from_secs(1), feed.next_change())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(change.added.len(), 1);
  assert_eq!(change.added[0].session_id, session_id);

  f.market
    .sessions()
    .respond_to_session(&session_id, &f.tutor, Decision::Accept)
    .await
    .unwrap();
  let change = tokio::time::timeout(Duration::from_secs(1), feed.next_change())
    .await
    .unwrap()
    .unwrap();
  assert!(change.added.is_empty());
  assert_eq!(change.updated.len(), 1);
  assert_eq!(change.updated[0].record.status, SessionStatus::Accepted);

  feed.unsubscribe();
}

#[tokio::test]
async fn undecodable_sessions_are_skipped() {
  let f = fixture().await;
  let session_id = f.request().await;
  f.store
    .set(
      scheme::user_sessions(Role::Tutor, &f.tutor).child("junk").unwrap(),
      json!({"status": 7}),
    )
    .await
    .unwrap();

  let listed = f
    .market
    .sessions()
    .list_my_sessions(&f.tutor, Role::Tutor)
    .await
    .unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].session_id, session_id);
}

#[tokio::test]
async fn get_session_reads_own_replica() {
  let f = fixture().await;
  let session_id = f.request().await;
  let session = f
    .market
    .sessions()
    .get_session(&f.student, Role::Student, &session_id)
    .await
    .unwrap();
  assert_eq!(session.record.tutor_id, f.tutor);

  let err = f
    .market
    .sessions()
    .get_session(&f.student, Role::Tutor, &session_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SessionNotFound(_)));
}

// ─── Consistency ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_sessions_are_consistent() {
  let f = fixture().await;
  let session_id = f.request().await;
  let report = f
    .market
    .sessions()
    .inspect_replicas(&session_id, &f.tutor)
    .await
    .unwrap();
  assert!(report.is_consistent());
  assert_eq!(report.replicas.len(), 3);
}

#[tokio::test]
async fn reconcile_repairs_damaged_replicas() {
  let f = fixture().await;
  let sessions = f.market.sessions();
  let session_id = f.request().await;
  sessions
    .respond_to_session(&session_id, &f.tutor, Decision::Accept)
    .await
    .unwrap();

  // Damage the replicas behind the repository's back.
  f.store
    .set(
      scheme::user_session_status(Role::Student, &f.student, &session_id),
      json!("pending"),
    )
    .await
    .unwrap();
  f.store.remove(scheme::global_session(&session_id)).await.unwrap();

  let report = sessions.inspect_replicas(&session_id, &f.tutor).await.unwrap();
  assert!(report.warnings.contains(&ConsistencyWarning::StatusMismatch {
    session_id: session_id.clone(),
    location:   ReplicaLocation::Student,
    expected:   SessionStatus::Accepted,
    found:      SessionStatus::Pending,
  }));
  assert!(report.warnings.contains(&ConsistencyWarning::MissingReplica {
    session_id: session_id.clone(),
    location:   ReplicaLocation::Global,
  }));

  let repaired = sessions.reconcile(&session_id, &f.tutor).await.unwrap();
  assert_eq!(repaired.len(), 2);
  assert!(sessions.inspect_replicas(&session_id, &f.tutor).await.unwrap().is_consistent());
  assert!(sessions.reconcile(&session_id, &f.tutor).await.unwrap().is_empty());
}

#[tokio::test]
async fn divergent_fields_are_reported() {
  let f = fixture().await;
  let session_id = f.request().await;
  f.store
    .set(
      scheme::user_session(Role::Student, &f.student, &session_id)
        .child("message")
        .unwrap(),
      json!("tampered"),
    )
    .await
    .unwrap();

  let report = f
    .market
    .sessions()
    .inspect_replicas(&session_id, &f.tutor)
    .await
    .unwrap();
  assert_eq!(report.warnings, [ConsistencyWarning::DivergentFields {
    session_id: session_id.clone(),
    location:   ReplicaLocation::Student,
    fields:     vec!["message"],
  }]);
}

// ─── Store failures ──────────────────────────────────────────────────────────

/// Delegates to an inner store; `push` fails, `commit` can be made to hang,
/// and while `reject_students` is set any batch writing a student profile
/// fails.
struct Degraded {
  inner:           SqliteStore,
  stall_commit:    bool,
  reject_students: AtomicBool,
}

impl RecordStore for Degraded {
  type Error = tutr_store_sqlite::Error;

  fn generate_key(&self) -> Key { self.inner.generate_key() }

  async fn get(&self, path: RecordPath) -> Result<Option<Value>, Self::Error> {
    self.inner.get(path).await
  }

  async fn set(&self, path: RecordPath, value: Value) -> Result<(), Self::Error> {
    self.inner.set(path, value).await
  }

  async fn remove(&self, path: RecordPath) -> Result<(), Self::Error> {
    self.inner.remove(path).await
  }

  async fn push(&self, _parent: RecordPath, _value: Value) -> Result<Key, Self::Error> {
    Err(tutr_store_sqlite::Error::ScalarAtRoot)
  }

  async fn commit(&self, batch: WriteBatch) -> Result<(), Self::Error> {
    if self.stall_commit {
      std::future::pending::<()>().await;
    }
    let writes_student = batch
      .writes()
      .iter()
      .any(|(path, _)| path.to_string().starts_with("students/"));
    if writes_student && self.reject_students.load(Ordering::SeqCst) {
      return Err(tutr_store_sqlite::Error::ScalarAtRoot);
    }
    self.inner.commit(batch).await
  }

  async fn watch(&self, path: RecordPath) -> Result<Subscription, Self::Error> {
    self.inner.watch(path).await
  }
}

async fn degraded(
  stall_commit: bool,
  config: MarketConfig,
) -> (SqliteStore, Arc<Degraded>, Market<Degraded>) {
  let inner = SqliteStore::open_in_memory().await.expect("in-memory store");
  seed(&Market::new(Arc::new(inner.clone()), MarketConfig::default())).await;
  let store = Arc::new(Degraded {
    inner: inner.clone(),
    stall_commit,
    reject_students: AtomicBool::new(false),
  });
  (inner, Arc::clone(&store), Market::new(store, config))
}

#[tokio::test]
async fn hung_store_times_out() {
  let config = MarketConfig { op_timeout_ms: 50, ..Default::default() };
  let (inner, _, market) = degraded(true, config).await;

  let err = market
    .sessions()
    .request_session(calculus_request())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Timeout { operation: "commit", .. }));
  assert!(err.is_retryable());
  assert_eq!(inner.get(scheme::global_sessions()).await.unwrap(), None);
}

#[tokio::test]
async fn failed_notice_does_not_fail_the_request() {
  let (inner, _, market) = degraded(false, MarketConfig::default()).await;

  let session_id = market
    .sessions()
    .request_session(calculus_request())
    .await
    .unwrap();
  let tutor_replica = inner
    .get(scheme::user_session(Role::Tutor, &id("T1"), &session_id))
    .await
    .unwrap();
  assert!(tutor_replica.is_some());
  assert_eq!(inner.get(scheme::chats()).await.unwrap(), None);
}

#[tokio::test]
async fn failed_profile_write_leaves_the_email_free() {
  let (inner, store, market) = degraded(false, MarketConfig::default()).await;
  store.reject_students.store(true, Ordering::SeqCst);

  let err = market
    .create_account("grace@example.com", "hopper42", Role::Student, profile("Grace"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Store { .. }));
  let emails = RecordPath::parse("accountEmails").unwrap();
  assert_eq!(inner.get(emails).await.unwrap(), None);
  let err = market.authenticate("grace@example.com", "hopper42").await.unwrap_err();
  assert!(matches!(err, Error::InvalidCredentials));

  store.reject_students.store(false, Ordering::SeqCst);
  let user = market
    .create_account("grace@example.com", "hopper42", Role::Student, profile("Grace"))
    .await
    .unwrap();
  let authed = market.authenticate("grace@example.com", "hopper42").await.unwrap();
  assert_eq!(authed, user);
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn resolve_returns_tagged_user() {
  let f = fixture().await;
  let tutor = f.market.users().resolve(&f.tutor).await.unwrap();
  assert!(matches!(tutor, User::Tutor(_)));
  assert_eq!(tutor.display_name(), "Ada");

  let student = f.market.users().resolve(&f.student).await.unwrap();
  assert_eq!(student.role(), Role::Student);

  let err = f.market.users().resolve(&id("nobody")).await.unwrap_err();
  assert!(matches!(err, Error::UserNotFound(_)));
}

#[tokio::test]
async fn roles_stay_disjoint() {
  let f = fixture().await;
  let err = f
    .market
    .users()
    .register(f.tutor.clone(), Role::Student, profile("Ada"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::AlreadyRegistered(_)));
  assert_eq!(f.market.users().resolve(&f.tutor).await.unwrap().role(), Role::Tutor);
}

#[tokio::test]
async fn tutors_with_sessions_still_resolve() {
  let f = fixture().await;
  f.request().await;
  let tutor = f.market.users().tutor(&f.tutor).await.unwrap();
  assert_eq!(tutor.profile().study_line, "math");
}

// ─── Identity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sign_up_sign_out_sign_in() {
  let f = fixture().await;
  let identity = f.market.identity();
  assert_eq!(identity.current_user_id(), None);

  let user_id = identity.sign_up("Ada@Example.com", "hunter22").await.unwrap();
  assert_eq!(identity.current_user_id(), Some(user_id.clone()));

  identity.sign_out();
  assert_eq!(identity.current_user_id(), None);

  let again = identity.sign_in("ada@example.com", "hunter22").await.unwrap();
  assert_eq!(again, user_id);
  assert_eq!(identity.current_user_id(), Some(user_id));
}

#[tokio::test]
async fn wrong_password_is_rejected() {
  let f = fixture().await;
  let identity = f.market.identity();
  identity.sign_up("ada@example.com", "hunter22").await.unwrap();
  identity.sign_out();

  let err = identity.sign_in("ada@example.com", "hunter23").await.unwrap_err();
  assert!(matches!(err, Error::InvalidCredentials));
  let err = identity.sign_in("bob@example.com", "hunter22").await.unwrap_err();
  assert!(matches!(err, Error::InvalidCredentials));
  assert_eq!(identity.current_user_id(), None);
}

#[tokio::test]
async fn duplicate_email_is_taken() {
  let f = fixture().await;
  let identity = f.market.identity();
  identity.create_account("ada@example.com", "hunter22").await.unwrap();
  let err = identity
    .create_account("ADA@example.com", "different")
    .await
    .unwrap_err();
  assert!(matches!(err, Error::EmailTaken(_)));
}

#[tokio::test]
async fn short_password_is_weak() {
  let f = fixture().await;
  let err = f
    .market
    .identity()
    .create_account("ada@example.com", "12345")
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(tutr_core::Error::WeakPassword(_))));
}

#[tokio::test]
async fn comma_and_dot_emails_do_not_collide() {
  let f = fixture().await;
  let identity = f.market.identity();
  identity.create_account("a.b@example.com", "hunter22").await.unwrap();

  let err = identity
    .create_account("a,b@example.com", "hunter22")
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(tutr_core::Error::InvalidEmail(_))));
  let err = identity
    .verify_credentials("a,b@example.com", "hunter22")
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidCredentials));
  identity.verify_credentials("a.b@example.com", "hunter22").await.unwrap();
}

#[tokio::test]
async fn account_creation_registers_profile() {
  let f = fixture().await;
  let user = f
    .market
    .create_account("grace@example.com", "hopper42", Role::Tutor, profile("Grace"))
    .await
    .unwrap();
  assert_eq!(user.role(), Role::Tutor);

  let authed = f.market.authenticate("grace@example.com", "hopper42").await.unwrap();
  assert_eq!(authed, user);
}

// ─── Offers ──────────────────────────────────────────────────────────────────

fn new_offer(price: u32) -> NewOffer {
  NewOffer {
    kind: OfferKind::Individual,
    university: "ku".into(),
    study_line: "math".into(),
    exam: Some("Calculus 1".into()),
    price,
    description: "Exam prep".into(),
  }
}

#[tokio::test]
async fn offers_are_created_and_listed_newest_first() {
  let f = fixture().await;
  let offers = f.market.offers();
  let first = offers.create(&f.tutor, new_offer(200)).await.unwrap();
  let second = offers.create(&f.student, new_offer(150)).await.unwrap();

  let listed = offers.list().await.unwrap();
  assert_eq!(listed, [second.clone(), first.clone()]);
  assert_eq!(offers.list_by(&f.tutor).await.unwrap(), [first.clone()]);
  assert_eq!(offers.get(&first.offer_id).await.unwrap(), first);
}

#[tokio::test]
async fn offers_need_a_registered_creator_and_a_price() {
  let f = fixture().await;
  let offers = f.market.offers();

  let err = offers.create(&id("ghost"), new_offer(200)).await.unwrap_err();
  assert!(matches!(err, Error::UserNotFound(_)));

  let err = offers.create(&f.tutor, new_offer(0)).await.unwrap_err();
  assert_eq!(err.class(), ErrorClass::Validation);

  let err = offers.get(&"missing".parse().unwrap()).await.unwrap_err();
  assert!(matches!(err, Error::OfferNotFound(_)));
}

#[tokio::test]
async fn offer_feed_sees_new_offers() {
  let f = fixture().await;
  let mut feed = f.market.offers().subscribe().await.unwrap();
  assert!(feed.current().unwrap().is_empty());

  let offer = f.market.offers().create(&f.tutor, new_offer(99)).await.unwrap();
  let change = tokio::time::timeout(Duration::from_secs(1), feed.next_change())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(change.added, [offer]);
}

// ─── Messaging ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_between_participants() {
  let f = fixture().await;
  let messaging = f.market.messaging();
  let student = f.market.users().resolve(&f.student).await.unwrap();
  let tutor = f.market.users().resolve(&f.tutor).await.unwrap();

  let chat_id = messaging.start_chat(&f.student, &f.tutor).await.unwrap();
  messaging.send(&chat_id, &student, "Hi!").await.unwrap();
  messaging.send(&chat_id, &tutor, "Hello").await.unwrap();

  let history = messaging.history(&chat_id, &f.tutor).await.unwrap();
  let texts: Vec<&str> = history.iter().map(|m| m.record.text.as_str()).collect();
  assert_eq!(texts, ["Hi!", "Hello"]);
  assert_eq!(history[1].record.sender_name.as_deref(), Some("Ada"));
}

#[tokio::test]
async fn outsiders_cannot_read_or_write_chats() {
  let f = fixture().await;
  let messaging = f.market.messaging();
  let outsider = f
    .market
    .users()
    .register(id("S9"), Role::Student, profile("Eve"))
    .await
    .unwrap();

  let chat_id = messaging.start_chat(&f.student, &f.tutor).await.unwrap();
  let err = messaging.send(&chat_id, &outsider, "psst").await.unwrap_err();
  assert!(matches!(err, Error::NotChatParticipant { .. }));

  let err = messaging.history(&inbox(&f.tutor), outsider.id()).await.unwrap_err();
  assert!(matches!(err, Error::ChatNotFound(_)));
}

#[tokio::test]
async fn blank_chat_messages_are_rejected() {
  let f = fixture().await;
  let messaging = f.market.messaging();
  let student = f.market.users().resolve(&f.student).await.unwrap();
  let chat_id = messaging.start_chat(&f.student, &f.tutor).await.unwrap();

  let err = messaging.send(&chat_id, &student, "   ").await.unwrap_err();
  assert!(matches!(err, Error::Core(tutr_core::Error::EmptyMessage)));
  assert!(messaging.history(&chat_id, &f.student).await.unwrap().is_empty());
}

#[tokio::test]
async fn chat_feed_delivers_new_messages() {
  let f = fixture().await;
  let messaging = f.market.messaging();
  let tutor = f.market.users().resolve(&f.tutor).await.unwrap();
  let chat_id = messaging.start_chat(&f.tutor, &f.student).await.unwrap();

  let mut feed = messaging.subscribe(&chat_id, &f.student).await.unwrap();
  assert!(feed.current().unwrap().is_empty());

  messaging.send(&chat_id, &tutor, "See you at 14:30").await.unwrap();
  let messages = tokio::time::timeout(Duration::from_secs(1), feed.next())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(messages.len(), 1);
  assert_eq!(messages[0].record.text, "See you at 14:30");
}

#[tokio::test]
async fn chat_overview_lists_own_chats_with_latest_message() {
  let f = fixture().await;
  let messaging = f.market.messaging();
  let student = f.market.users().resolve(&f.student).await.unwrap();
  f.request().await;

  let chat_id = messaging.start_chat(&f.student, &f.tutor).await.unwrap();
  let quiet = messaging.start_chat(&f.tutor, &f.student).await.unwrap();
  messaging.send(&chat_id, &student, "Hi!").await.unwrap();
  messaging.send(&chat_id, &student, "Are you free?").await.unwrap();

  let chats = messaging.list_chats(&f.tutor).await.unwrap();
  assert_eq!(chats.len(), 3);
  assert_eq!(chats[2].chat_id, quiet);
  assert_eq!(chats[2].latest, None);
  let started = chats.iter().find(|c| c.chat_id == chat_id).unwrap();
  assert_eq!(started.latest.as_ref().unwrap().record.text, "Are you free?");
  assert!(started.participants.contains(&f.student));
  assert!(chats.iter().any(|c| c.chat_id == inbox(&f.tutor)));

  let chats = messaging.list_chats(&f.student).await.unwrap();
  assert_eq!(chats.len(), 2);
  assert!(chats.iter().all(|c| c.chat_id != inbox(&f.tutor)));
}

#[tokio::test]
async fn chat_overview_feed_follows_new_messages() {
  let f = fixture().await;
  let messaging = f.market.messaging();
  let tutor = f.market.users().resolve(&f.tutor).await.unwrap();
  let chat_id = messaging.start_chat(&f.tutor, &f.student).await.unwrap();

  let mut feed = messaging.subscribe_chats(&f.student).await.unwrap();
  let chats = feed.current().unwrap();
  assert_eq!(chats.len(), 1);
  assert_eq!(chats[0].latest, None);

  messaging.send(&chat_id, &tutor, "See you at 14:30").await.unwrap();
  let change = tokio::time::timeout(Duration::from_secs(1), feed.next_change())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(change.updated.len(), 1);
  let latest = change.updated[0].latest.as_ref().unwrap();
  assert_eq!(latest.record.text, "See you at 14:30");
}
