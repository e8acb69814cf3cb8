use speculate2::speculate;

speculate! {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use mindful_core::models::*;
    use mindful_core::questions::QuestionnaireForm;
    use mindful_core::{CoreError, Database};
    use serde_json::json;
    use uuid::Uuid;

    fn setup_db() -> Database {
        Database::open_memory().expect("Failed to create test database")
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    fn account(db: &Database, username: &str, role: Role) -> Principal {
        let account = db
            .create_user(CreateUserInput {
                username: username.into(),
                email: format!("{username}@example.org"),
                role,
            })
            .expect("Failed to create user");
        Principal::from(&account)
    }

    fn draft_program(db: &Database, owner: &Principal, weeks: u32) -> Program {
        db.create_program(owner, CreateProgramInput {
            name: "Mindful breathing".into(),
            description: "Weekly breathing practice".into(),
            context_type: "university".into(),
            methodology: "mbsr".into(),
            target_population: "students".into(),
            duration_weeks: weeks,
        })
        .expect("Failed to create program")
    }

    fn session_input(week: u32) -> CreateSessionInput {
        CreateSessionInput {
            title: format!("Week {week}"),
            description: String::new(),
            week_number: week,
            estimated_minutes: 15,
            practice_type: "breathing".into(),
            content: SessionContent::Timer { minutes: 15 },
            background_media: None,
        }
    }

    fn add_questionnaire(db: &Database, owner: &Principal, program_id: Uuid, moment: Moment) -> Questionnaire {
        db.create_questionnaire(owner, program_id, CreateQuestionnaireInput {
            moment,
            kind: QuestionnaireKind::Custom,
            title: format!("{} survey", moment.as_str()),
            description: None,
            form: json!([
                {"id": "stress", "type": "rating", "prompt": "Stress level", "stars": 5, "icon": "star"}
            ]),
        })
        .expect("Failed to create questionnaire")
    }

    /// A draft program with every week and both questionnaires in place.
    fn complete_draft(db: &Database, owner: &Principal, weeks: u32) -> Program {
        let program = draft_program(db, owner, weeks);
        for week in 1..=weeks {
            db.add_session(owner, program.id, session_input(week)).unwrap();
        }
        add_questionnaire(db, owner, program.id, Moment::Pre);
        add_questionnaire(db, owner, program.id, Moment::Post);
        program
    }

    fn published(db: &Database, owner: &Principal, weeks: u32) -> ProgramDetail {
        let program = complete_draft(db, owner, weeks);
        db.publish_program(owner, program.id, t0()).unwrap();
        db.get_program_detail(owner, program.id).unwrap()
    }

    describe "publication" {
        it "publishes a program with every week and both questionnaires" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let program = complete_draft(&db, &owner, 3);

            let published = db.publish_program(&owner, program.id, t0()).unwrap();
            assert_eq!(published.state, ProgramState::Published);
            assert_eq!(published.published_at, Some(t0()));

            let stored = db.get_program(&owner, program.id).unwrap();
            assert_eq!(stored.state, ProgramState::Published);
        }

        it "rejects a program with a missing week and leaves it in draft" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let program = complete_draft(&db, &owner, 3);
            let detail = db.get_program_detail(&owner, program.id).unwrap();
            let week_two = detail.sessions.iter().find(|s| s.week_number == 2).unwrap();
            db.delete_session(&owner, week_two.id).unwrap();

            let err = db.publish_program(&owner, program.id, t0()).unwrap_err();
            assert_eq!(err.kind(), "publication_precondition");
            assert!(err.to_string().contains("weeks 2"));

            let stored = db.get_program(&owner, program.id).unwrap();
            assert_eq!(stored.state, ProgramState::Draft);
            assert!(stored.published_at.is_none());
        }

        it "rejects a program without a post questionnaire" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let program = draft_program(&db, &owner, 1);
            db.add_session(&owner, program.id, session_input(1)).unwrap();
            add_questionnaire(&db, &owner, program.id, Moment::Pre);

            let err = db.publish_program(&owner, program.id, t0()).unwrap_err();
            assert!(matches!(err, CoreError::PublicationPrecondition(_)));
        }

        it "rejects sessions beyond the program duration" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let program = complete_draft(&db, &owner, 2);
            db.add_session(&owner, program.id, session_input(3)).unwrap();

            let err = db.publish_program(&owner, program.id, t0()).unwrap_err();
            assert_eq!(err.kind(), "publication_precondition");
        }

        it "publishes only once" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let detail = published(&db, &owner, 1);

            let err = db.publish_program(&owner, detail.program.id, t0()).unwrap_err();
            assert_eq!(err.kind(), "invalid_state");
        }

        it "only lets the owner publish" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let other = account(&db, "tomas", Role::Researcher);
            let program = complete_draft(&db, &owner, 1);

            let err = db.publish_program(&other, program.id, t0()).unwrap_err();
            assert_eq!(err.kind(), "forbidden");
        }
    }

    describe "published programs" {
        it "reject session and questionnaire changes" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let detail = published(&db, &owner, 2);
            let program_id = detail.program.id;
            let session = &detail.sessions[0];
            let questionnaire = &detail.questionnaires[0];

            let add = db.add_session(&owner, program_id, session_input(3)).unwrap_err();
            assert_eq!(add.kind(), "immutable_resource");

            let update = db
                .update_session(&owner, session.id, UpdateSessionInput {
                    title: Some("Renamed".into()),
                    ..Default::default()
                })
                .unwrap_err();
            assert_eq!(update.kind(), "immutable_resource");

            let delete = db.delete_session(&owner, session.id).unwrap_err();
            assert_eq!(delete.kind(), "immutable_resource");

            let edit = db
                .update_questionnaire(&owner, questionnaire.id, UpdateQuestionnaireInput {
                    title: Some("Renamed".into()),
                    ..Default::default()
                })
                .unwrap_err();
            assert_eq!(edit.kind(), "immutable_resource");

            let remove = db.delete_questionnaire(&owner, questionnaire.id).unwrap_err();
            assert_eq!(remove.kind(), "immutable_resource");

            let program_edit = db
                .update_program(&owner, program_id, UpdateProgramInput {
                    name: Some("Renamed".into()),
                    ..Default::default()
                })
                .unwrap_err();
            assert_eq!(program_edit.kind(), "immutable_resource");

            assert_eq!(db.delete_program(&owner, program_id).unwrap_err().kind(), "immutable_resource");
        }

        it "reject new questionnaires" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let detail = published(&db, &owner, 1);
            db.with_connection(|conn| {
                conn.execute("DELETE FROM questionnaires WHERE moment = 'pre'", [])?;
                Ok(())
            })
            .unwrap();

            let err = db
                .create_questionnaire(&owner, detail.program.id, CreateQuestionnaireInput {
                    moment: Moment::Pre,
                    kind: QuestionnaireKind::Custom,
                    title: "Again".into(),
                    description: None,
                    form: json!([{"id": "q", "type": "text", "prompt": "?"}]),
                })
                .unwrap_err();
            assert_eq!(err.kind(), "immutable_resource");
        }
    }

    describe "session catalog" {
        it "lists sessions by week ascending" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let program = draft_program(&db, &owner, 3);
            for week in [3, 1, 2] {
                db.add_session(&owner, program.id, session_input(week)).unwrap();
            }

            let weeks: Vec<u32> = db
                .list_sessions(&owner, program.id)
                .unwrap()
                .iter()
                .map(|s| s.week_number)
                .collect();
            assert_eq!(weeks, vec![1, 2, 3]);
        }

        it "rejects a second session for the same week" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let program = draft_program(&db, &owner, 2);
            db.add_session(&owner, program.id, session_input(1)).unwrap();

            let err = db.add_session(&owner, program.id, session_input(1)).unwrap_err();
            assert!(matches!(err, CoreError::DuplicateWeek { week: 1 }));
        }

        it "rejects moving a session onto an occupied week" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let program = draft_program(&db, &owner, 2);
            db.add_session(&owner, program.id, session_input(1)).unwrap();
            let second = db.add_session(&owner, program.id, session_input(2)).unwrap();

            let err = db
                .update_session(&owner, second.id, UpdateSessionInput {
                    week_number: Some(1),
                    ..Default::default()
                })
                .unwrap_err();
            assert_eq!(err.kind(), "duplicate_week");
        }

        it "validates content against its type" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let program = draft_program(&db, &owner, 1);

            let bad_link = CreateSessionInput {
                content: SessionContent::Link { url: "not a url".into() },
                ..session_input(1)
            };
            assert_eq!(db.add_session(&owner, program.id, bad_link).unwrap_err().kind(), "validation_error");

            let audio = CreateSessionInput {
                content: SessionContent::Audio { media: "media/raisin.mp3".into() },
                ..session_input(1)
            };
            let stored = db.add_session(&owner, program.id, audio).unwrap();
            let loaded = db.get_session(&owner, stored.id).unwrap();
            assert_eq!(loaded.content, SessionContent::Audio { media: "media/raisin.mp3".into() });
        }
    }

    describe "questionnaires" {
        it "allows one questionnaire per moment" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let program = draft_program(&db, &owner, 1);
            add_questionnaire(&db, &owner, program.id, Moment::Pre);

            let err = db
                .create_questionnaire(&owner, program.id, CreateQuestionnaireInput {
                    moment: Moment::Pre,
                    kind: QuestionnaireKind::Custom,
                    title: "Second".into(),
                    description: None,
                    form: json!([{"id": "q", "type": "text", "prompt": "?"}]),
                })
                .unwrap_err();
            assert!(matches!(err, CoreError::DuplicateMoment { moment: "pre" }));
        }

        it "links the questionnaire to the program and unlinks on delete" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let program = draft_program(&db, &owner, 1);
            let pre = add_questionnaire(&db, &owner, program.id, Moment::Pre);
            assert_eq!(db.get_program(&owner, program.id).unwrap().pre_questionnaire_id, Some(pre.id));

            db.delete_questionnaire(&owner, pre.id).unwrap();
            assert_eq!(db.get_program(&owner, program.id).unwrap().pre_questionnaire_id, None);
        }

        it "rejects a malformed form without writing anything" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let program = draft_program(&db, &owner, 1);

            let err = db
                .create_questionnaire(&owner, program.id, CreateQuestionnaireInput {
                    moment: Moment::Pre,
                    kind: QuestionnaireKind::Custom,
                    title: "Broken".into(),
                    description: None,
                    form: json!([
                        {"id": "ok", "type": "text", "prompt": "Fine"},
                        {"id": "bad", "type": "multi_select", "prompt": "Pick", "options": []}
                    ]),
                })
                .unwrap_err();
            assert_eq!(err.kind(), "validation_error");
            assert!(db.get_program_detail(&owner, program.id).unwrap().questionnaires.is_empty());
        }

        it "stores likert forms" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let program = draft_program(&db, &owner, 1);
            let likert = db
                .create_questionnaire(&owner, program.id, CreateQuestionnaireInput {
                    moment: Moment::Post,
                    kind: QuestionnaireKind::Likert,
                    title: "FFMQ".into(),
                    description: Some("Five facets".into()),
                    form: json!({"scale_labels": ["never", "rarely", "often", "always"], "statements": ["I notice sensations", "I describe feelings"]}),
                })
                .unwrap();

            let loaded = db.get_questionnaire(&owner, likert.id).unwrap();
            let QuestionnaireForm::Likert(scale) = loaded.form else {
                panic!("expected a likert form");
            };
            assert_eq!(scale.statements.len(), 2);
            assert_eq!(loaded.kind, QuestionnaireKind::Likert);
        }
    }

    describe "enrollment" {
        it "cannot join a draft program" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let participant = account(&db, "ines", Role::Participant);
            let program = complete_draft(&db, &owner, 1);

            let err = db.enroll(&participant, program.id, t0()).unwrap_err();
            assert_eq!(err.kind(), "invalid_state");
        }

        it "enrolls once per program" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let participant = account(&db, "ines", Role::Participant);
            let detail = published(&db, &owner, 2);

            let enrollment = db.enroll(&participant, detail.program.id, t0()).unwrap();
            assert_eq!(enrollment.state, EnrollmentState::InProgress);
            assert_eq!(enrollment.start_time, t0());

            let err = db.enroll(&participant, detail.program.id, t0()).unwrap_err();
            assert!(matches!(err, CoreError::AlreadyEnrolled));
            assert_eq!(db.list_program_enrollments(&owner, detail.program.id).unwrap().len(), 1);
        }

        it "refuses a second program while one is in progress" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let participant = account(&db, "ines", Role::Participant);
            let first = published(&db, &owner, 1);
            let second = published(&db, &owner, 1);

            db.enroll(&participant, first.program.id, t0()).unwrap();
            let err = db.enroll(&participant, second.program.id, t0()).unwrap_err();
            assert_eq!(err.kind(), "already_in_another_program");
        }

        it "allows a new program after abandoning the current one" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let participant = account(&db, "ines", Role::Participant);
            let first = published(&db, &owner, 1);
            let second = published(&db, &owner, 1);

            let enrollment = db.enroll(&participant, first.program.id, t0()).unwrap();
            db.abandon(&participant, enrollment.id, t0() + Duration::days(1)).unwrap();
            let next = db.enroll(&participant, second.program.id, t0() + Duration::days(2)).unwrap();

            let (current, program) = db.current_program(&participant).unwrap().unwrap();
            assert_eq!(current.id, next.id);
            assert_eq!(program.id, second.program.id);
        }

        it "abandons only in-progress enrollments" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let participant = account(&db, "ines", Role::Participant);
            let detail = published(&db, &owner, 2);
            let enrollment = db.enroll(&participant, detail.program.id, t0()).unwrap();

            let later = t0() + Duration::days(3);
            let abandoned = db.abandon(&participant, enrollment.id, later).unwrap();
            assert_eq!(abandoned.state, EnrollmentState::Abandoned);
            assert_eq!(abandoned.end_time, Some(later));

            let err = db.abandon(&participant, enrollment.id, later).unwrap_err();
            assert_eq!(err.kind(), "invalid_state");
        }

        it "does not let another participant abandon" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let participant = account(&db, "ines", Role::Participant);
            let stranger = account(&db, "bruno", Role::Participant);
            let detail = published(&db, &owner, 1);
            let enrollment = db.enroll(&participant, detail.program.id, t0()).unwrap();

            let err = db.abandon(&stranger, enrollment.id, t0()).unwrap_err();
            assert_eq!(err.kind(), "forbidden");
        }
    }

    describe "session availability" {
        it "follows the weekly window and diary entries" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let participant = account(&db, "ines", Role::Participant);
            let participant_id = participant.participant_id.unwrap();
            let detail = published(&db, &owner, 2);
            let week1 = detail.sessions[0].id;
            let week2 = detail.sessions[1].id;
            db.enroll(&participant, detail.program.id, t0()).unwrap();

            assert!(!db.is_session_available(week1, participant_id, t0() - Duration::seconds(1)).unwrap());
            assert!(db.is_session_available(week1, participant_id, t0()).unwrap());
            assert!(db.is_session_available(week1, participant_id, t0() + Duration::days(7)).unwrap());
            assert!(!db.is_session_available(week2, participant_id, t0() + Duration::days(8)).unwrap());

            db.submit_diary_entry(&participant, week1, CreateDiaryEntryInput {
                rating: 4,
                comment: Some("Calmer than expected".into()),
            }, t0() + Duration::days(2))
            .unwrap();

            assert!(!db.is_session_available(week1, participant_id, t0() + Duration::days(3)).unwrap());
            assert!(!db.is_session_available(week2, participant_id, t0() + Duration::days(6)).unwrap());
            assert!(db.is_session_available(week2, participant_id, t0() + Duration::days(7)).unwrap());
            assert!(!db.is_session_available(week2, participant_id, t0() + Duration::days(15)).unwrap());
        }

        it "is closed without an enrollment" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let participant = account(&db, "ines", Role::Participant);
            let detail = published(&db, &owner, 1);

            let available = db
                .is_session_available(detail.sessions[0].id, participant.participant_id.unwrap(), t0())
                .unwrap();
            assert!(!available);
        }

        it "refuses diary entries for unavailable or journaled sessions" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let participant = account(&db, "ines", Role::Participant);
            let detail = published(&db, &owner, 2);
            db.enroll(&participant, detail.program.id, t0()).unwrap();
            let entry = CreateDiaryEntryInput { rating: 3, comment: None };

            let early = db
                .submit_diary_entry(&participant, detail.sessions[1].id, entry.clone(), t0() + Duration::days(8))
                .unwrap_err();
            assert_eq!(early.kind(), "invalid_state");

            db.submit_diary_entry(&participant, detail.sessions[0].id, entry.clone(), t0()).unwrap();
            let again = db
                .submit_diary_entry(&participant, detail.sessions[0].id, entry, t0())
                .unwrap_err();
            assert!(matches!(again, CoreError::DuplicateDiaryEntry));
        }

        it "rejects ratings outside the scale" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let participant = account(&db, "ines", Role::Participant);
            let detail = published(&db, &owner, 1);
            db.enroll(&participant, detail.program.id, t0()).unwrap();

            let err = db
                .submit_diary_entry(&participant, detail.sessions[0].id, CreateDiaryEntryInput { rating: 9, comment: None }, t0())
                .unwrap_err();
            assert_eq!(err.kind(), "validation_error");
        }

        it "reports progress across the program" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let participant = account(&db, "ines", Role::Participant);
            let detail = published(&db, &owner, 3);
            let enrollment = db.enroll(&participant, detail.program.id, t0()).unwrap();
            db.submit_diary_entry(&participant, detail.sessions[0].id, CreateDiaryEntryInput { rating: 5, comment: None }, t0()).unwrap();

            let progress = db.enrollment_progress(&participant, enrollment.id, t0() + Duration::days(8)).unwrap();
            assert_eq!(progress.current_week, Some(2));
            assert_eq!(progress.journaled_sessions, 1);
            assert_eq!(progress.end_time, t0() + Duration::weeks(3));
            let available: Vec<bool> = progress.sessions.iter().map(|s| s.available).collect();
            assert_eq!(available, vec![false, true, false]);
        }
    }

    describe "questionnaire responses" {
        it "accepts one response per participant" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let participant = account(&db, "ines", Role::Participant);
            let detail = published(&db, &owner, 1);
            let pre = detail.questionnaires.iter().find(|q| q.moment == Moment::Pre).unwrap();
            db.enroll(&participant, detail.program.id, t0()).unwrap();

            let first = db
                .submit_response(&participant, pre.id, SubmitResponseInput { answers: json!({"stress": 4}) }, t0())
                .unwrap();
            assert!(first.completed_enrollment.is_none());

            let err = db
                .submit_response(&participant, pre.id, SubmitResponseInput { answers: json!({"stress": 2}) }, t0())
                .unwrap_err();
            assert!(matches!(err, CoreError::DuplicateResponse));
            assert_eq!(db.list_responses(&owner, pre.id).unwrap().len(), 1);
        }

        it "completes the enrollment on the post questionnaire" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let participant = account(&db, "ines", Role::Participant);
            let detail = published(&db, &owner, 1);
            let post = detail.questionnaires.iter().find(|q| q.moment == Moment::Post).unwrap();
            let enrollment = db.enroll(&participant, detail.program.id, t0()).unwrap();

            let later = t0() + Duration::days(7);
            let outcome = db
                .submit_response(&participant, post.id, SubmitResponseInput { answers: json!({"stress": 2}) }, later)
                .unwrap();
            let completed = outcome.completed_enrollment.unwrap();
            assert_eq!(completed.id, enrollment.id);
            assert_eq!(completed.state, EnrollmentState::Completed);
            assert_eq!(db.get_enrollment(&participant, enrollment.id).unwrap().state, EnrollmentState::Completed);
            assert!(db.current_program(&participant).unwrap().is_none());
        }

        it "stores the post response without completing when nothing is in progress" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let participant = account(&db, "ines", Role::Participant);
            let detail = published(&db, &owner, 1);
            let post = detail.questionnaires.iter().find(|q| q.moment == Moment::Post).unwrap();
            let enrollment = db.enroll(&participant, detail.program.id, t0()).unwrap();
            db.abandon(&participant, enrollment.id, t0()).unwrap();

            let outcome = db
                .submit_response(&participant, post.id, SubmitResponseInput { answers: json!({"stress": 1}) }, t0())
                .unwrap();
            assert!(outcome.completed_enrollment.is_none());

            let enrollments = db.list_program_enrollments(&owner, detail.program.id).unwrap();
            assert!(enrollments.iter().all(|e| e.state != EnrollmentState::Completed));
        }

        it "validates answers against the form" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let participant = account(&db, "ines", Role::Participant);
            let detail = published(&db, &owner, 1);
            let pre = &detail.questionnaires[0];

            let err = db
                .submit_response(&participant, pre.id, SubmitResponseInput { answers: json!({"stress": 11}) }, t0())
                .unwrap_err();
            assert_eq!(err.kind(), "validation_error");
            assert!(db.get_own_response(&participant, pre.id).unwrap().is_none());
        }
    }

    describe "duplicate program" {
        it "deep copies into a fresh draft" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let source = published(&db, &owner, 2);

            let copy = db.duplicate_program(&owner, source.program.id).unwrap();
            assert_eq!(copy.program.state, ProgramState::Draft);
            assert_ne!(copy.program.id, source.program.id);
            assert_eq!(copy.program.name, "Mindful breathing (copy)");
            assert_eq!(copy.sessions.len(), 2);
            assert!(copy.sessions.iter().all(|s| s.program_id == copy.program.id));
            assert!(copy.sessions.iter().all(|s| source.sessions.iter().all(|o| o.id != s.id)));
            assert_eq!(copy.questionnaires.len(), 2);

            let stored = db.get_program(&owner, copy.program.id).unwrap();
            assert!(stored.pre_questionnaire_id.is_some());
            assert_ne!(stored.pre_questionnaire_id, source.program.pre_questionnaire_id);

            let original = db.get_program_detail(&owner, source.program.id).unwrap();
            assert_eq!(original.sessions.len(), 2);
            assert_eq!(original.program.state, ProgramState::Published);

            db.publish_program(&owner, copy.program.id, t0()).unwrap();
        }
    }

    describe "statistics" {
        it "rolls up enrollments, diary entries and responses" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let ines = account(&db, "ines", Role::Participant);
            let bruno = account(&db, "bruno", Role::Participant);
            let detail = published(&db, &owner, 1);
            let post = detail.questionnaires.iter().find(|q| q.moment == Moment::Post).unwrap();
            let session = detail.sessions[0].id;

            db.enroll(&ines, detail.program.id, t0()).unwrap();
            let bruno_enrollment = db.enroll(&bruno, detail.program.id, t0()).unwrap();
            db.submit_diary_entry(&ines, session, CreateDiaryEntryInput { rating: 4, comment: None }, t0()).unwrap();
            db.submit_diary_entry(&bruno, session, CreateDiaryEntryInput { rating: 2, comment: None }, t0()).unwrap();
            db.submit_response(&ines, post.id, SubmitResponseInput { answers: json!({"stress": 3}) }, t0()).unwrap();
            db.abandon(&bruno, bruno_enrollment.id, t0()).unwrap();

            let stats = db.program_stats(&owner, detail.program.id).unwrap();
            assert_eq!(stats.total_enrollments, 2);
            assert_eq!(stats.completed, 1);
            assert_eq!(stats.abandoned, 1);
            assert_eq!(stats.in_progress, 0);
            assert!((stats.completion_rate - 0.5).abs() < f64::EPSILON);
            assert_eq!(stats.sessions[0].diary_entries, 2);
            assert_eq!(stats.sessions[0].average_rating, Some(3.0));
            let post_stats = stats.questionnaires.iter().find(|q| q.moment == Moment::Post).unwrap();
            assert_eq!(post_stats.responses, 1);

            let overview = db.researcher_overview(&owner).unwrap();
            assert_eq!(overview.total_programs, 1);
            assert_eq!(overview.published_programs, 1);
            assert_eq!(overview.completed_enrollments, 1);

            let rows = db.diary_export_rows(&owner, detail.program.id).unwrap();
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].username, "bruno");
        }

        it "is restricted to the owning researcher" {
            let db = setup_db();
            let owner = account(&db, "rosa", Role::Researcher);
            let other = account(&db, "tomas", Role::Researcher);
            let detail = published(&db, &owner, 1);

            assert_eq!(db.program_stats(&other, detail.program.id).unwrap_err().kind(), "forbidden");
        }
    }

    describe "accounts" {
        it "creates the profile matching the role" {
            let db = setup_db();
            let researcher = account(&db, "rosa", Role::Researcher);
            let participant = account(&db, "ines", Role::Participant);
            let admin = account(&db, "root", Role::Admin);

            assert!(researcher.researcher_id.is_some() && researcher.participant_id.is_none());
            assert!(participant.participant_id.is_some() && participant.researcher_id.is_none());
            assert!(admin.researcher_id.is_none() && admin.participant_id.is_none());
            assert_eq!(db.principal(participant.user_id).unwrap(), participant);
        }

        it "rejects duplicate usernames" {
            let db = setup_db();
            account(&db, "rosa", Role::Researcher);
            let err = db
                .create_user(CreateUserInput {
                    username: "rosa".into(),
                    email: "other@example.org".into(),
                    role: Role::Participant,
                })
                .unwrap_err();
            assert_eq!(err.kind(), "validation_error");
            assert_eq!(db.list_accounts().unwrap().len(), 1);
        }

        it "keeps participants out of researcher operations" {
            let db = setup_db();
            let participant = account(&db, "ines", Role::Participant);
            let err = db
                .create_program(&participant, CreateProgramInput {
                    name: "Nope".into(),
                    description: String::new(),
                    context_type: String::new(),
                    methodology: String::new(),
                    target_population: String::new(),
                    duration_weeks: 1,
                })
                .unwrap_err();
            assert_eq!(err.kind(), "forbidden");
        }
    }
}
