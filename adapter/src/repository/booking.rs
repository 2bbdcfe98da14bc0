use crate::database::{
    model::{
        booking::{BookerRow, BookingWithSlotRow},
        slot::SlotRow,
    },
    ConnectionPool,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use derive_new::new;
use kernel::model::{
    booking::{
        event::{CancelBooking, CreateBooking},
        BookingWithSlot, SlotOccurrenceBooker,
    },
    id::{BookingId, SlotId, UserId},
    slot::Slot,
};
use kernel::repository::booking::BookingRepository;
use shared::error::{AppError, AppResult};

#[derive(new)]
pub struct BookingRepositoryImpl {
    db: ConnectionPool,
}

#[async_trait]
impl BookingRepository for BookingRepositoryImpl {
    // 予約操作を行う。
    // コミット時に競合が検出された場合は、チェックからやり直すリトライを
    // 1 回だけ行う（それでも競合するなら StorageConflict を返す）
    async fn create(&self, event: CreateBooking) -> AppResult<BookingId> {
        match self.try_create(&event).await {
            Err(AppError::StorageConflict(_)) => self.try_create(&event).await,
            result => result,
        }
    }

    // キャンセル操作を行う。本人または管理者のみが実行できる
    async fn cancel(&self, event: CancelBooking) -> AppResult<()> {
        let row: Option<(UserId,)> =
            sqlx::query_as("SELECT user_id FROM bookings WHERE booking_id = $1")
                .bind(event.booking_id)
                .fetch_optional(self.db.inner_ref())
                .await
                .map_err(AppError::SpecificOperationError)?;

        let Some((booked_by,)) = row else {
            return Err(AppError::EntityNotFound(format!(
                "予約（{}）が見つかりませんでした。",
                event.booking_id
            )));
        };

        if booked_by != event.requested_by && !event.is_admin {
            return Err(AppError::ForbiddenOperation);
        }

        let res = sqlx::query("DELETE FROM bookings WHERE booking_id = $1")
            .bind(event.booking_id)
            .execute(self.db.inner_ref())
            .await
            .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(AppError::EntityNotFound(format!(
                "予約（{}）が見つかりませんでした。",
                event.booking_id
            )));
        }

        Ok(())
    }

    // ユーザーの指定日の予約一覧を取得する（開始時刻順）
    async fn find_by_user_and_date(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> AppResult<Vec<BookingWithSlot>> {
        let rows: Vec<BookingWithSlotRow> = sqlx::query_as(
            r#"
                SELECT
                    b.booking_id,
                    b.slot_id,
                    b.booked_for,
                    b.created_at,
                    s.facility,
                    s.title,
                    s.starts_at,
                    s.ends_at
                FROM bookings AS b
                INNER JOIN slots AS s ON s.slot_id = b.slot_id
                WHERE b.user_id = $1 AND b.booked_for = $2
                ORDER BY s.starts_at ASC
            "#,
        )
        .bind(user_id)
        .bind(date)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        rows.into_iter().map(BookingWithSlot::try_from).collect()
    }

    // スロットの指定日の予約者一覧を取得する。
    // 並び順（surname, name）は帳票出力側との契約である
    async fn find_bookers_by_slot_and_date(
        &self,
        slot_id: SlotId,
        date: NaiveDate,
    ) -> AppResult<Vec<SlotOccurrenceBooker>> {
        let slot_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM slots WHERE slot_id = $1)")
                .bind(slot_id)
                .fetch_one(self.db.inner_ref())
                .await
                .map_err(AppError::SpecificOperationError)?;

        if !slot_exists {
            return Err(AppError::EntityNotFound(format!(
                "スロット（{slot_id}）が見つかりませんでした。"
            )));
        }

        let rows: Vec<BookerRow> = sqlx::query_as(
            r#"
                SELECT
                    u.user_id,
                    u.surname,
                    u.name,
                    u.group_name,
                    b.created_at
                FROM bookings AS b
                INNER JOIN users AS u ON u.user_id = b.user_id
                WHERE b.slot_id = $1 AND b.booked_for = $2
                ORDER BY u.surname ASC, u.name ASC
            "#,
        )
        .bind(slot_id)
        .bind(date)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        Ok(rows.into_iter().map(SlotOccurrenceBooker::from).collect())
    }
}

impl BookingRepositoryImpl {
    // check-then-act をひとつのトランザクションとして実行する。
    //
    // 最初にスロット行を FOR UPDATE でロックすることで、同一スロットへの
    // 並行予約を直列化する。別スロットへの予約は別の行ロックなので
    // 互いにブロックしない。素朴な read-then-write は定員超過を
    // 再現する既知のバグであり、使用してはならない
    async fn try_create(&self, event: &CreateBooking) -> AppResult<BookingId> {
        let mut tx = self.db.begin().await?;

        // 事前のチェックとして、以下を調べる。
        // - 指定のスロット ID をもつスロットが存在するか
        // - スロットが有効で、日付の曜日が一致しているか
        // - 同一ユーザーの同一スロット・同一日の予約がないか
        // - 定員に空きがあるか
        //
        // 上記のすべてが Yes だった場合、このブロック以降の処理に進む
        {
            //
            // ① スロットの存在確認 ＋ 行ロックの取得
            //
            let slot_row: Option<SlotRow> = sqlx::query_as(
                r#"
                SELECT slot_id, facility, title, weekday, starts_at, ends_at, capacity, is_active
                FROM slots
                WHERE slot_id = $1
                FOR UPDATE
                "#,
            )
            .bind(event.slot_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::SpecificOperationError)?;

            let slot: Slot = match slot_row {
                None => {
                    return Err(AppError::EntityNotFound(format!(
                        "スロット（{}）が見つかりませんでした。",
                        event.slot_id
                    )))
                }
                Some(row) => row.try_into()?,
            };

            //
            // ② is_active チェック ＋ 曜日の一致チェック
            //
            if !slot.is_active {
                return Err(AppError::SlotUnavailable(format!(
                    "スロット（{}）は現在利用できません（is_active = false）",
                    event.slot_id
                )));
            }

            if !slot.occurs_on(event.booked_for) {
                return Err(AppError::SlotUnavailable(format!(
                    "スロット（{}）は {} には開催されません。",
                    event.slot_id, event.booked_for
                )));
            }

            //
            // ③ 同一 (user, slot, date) の予約がないか確認
            //
            let already_booked: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM bookings
                    WHERE user_id = $1 AND slot_id = $2 AND booked_for = $3
                )
                "#,
            )
            .bind(event.booked_by)
            .bind(event.slot_id)
            .bind(event.booked_for)
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::SpecificOperationError)?;

            if already_booked {
                return Err(AppError::AlreadyBooked(format!(
                    "スロット（{}）の {} はすでに予約済みです。",
                    event.slot_id, event.booked_for
                )));
            }

            //
            // ④ 定員チェック。定員はキャッシュせず、コミット済みの
            //    予約数をその場で数える
            //
            if slot.capacity.is_some() {
                let booked_count: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM bookings WHERE slot_id = $1 AND booked_for = $2",
                )
                .bind(event.slot_id)
                .bind(event.booked_for)
                .fetch_one(&mut *tx)
                .await
                .map_err(AppError::SpecificOperationError)?;

                if slot.is_full(booked_count) {
                    return Err(AppError::SlotFull(format!(
                        "スロット（{}）の {} は満員です。",
                        event.slot_id, event.booked_for
                    )));
                }
            }
        }

        // ここまでのチェックを通過すれば予約を作成する
        let booking_id = BookingId::new();
        let res = sqlx::query(
            r#"
                INSERT INTO bookings (booking_id, user_id, slot_id, booked_for)
                VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(booking_id)
        .bind(event.booked_by)
        .bind(event.slot_id)
        .bind(event.booked_for)
        .execute(&mut *tx)
        .await
        .map_err(Self::classify_conflict)?;

        if res.rows_affected() < 1 {
            return Err(AppError::NoRowsAffectedError(
                "No booking record has been created".into(),
            ));
        }

        tx.commit().await.map_err(Self::classify_conflict)?;

        Ok(booking_id)
    }

    // チェック通過後にストレージ層で検出された競合を分類する。
    // 一意制約違反（23505）は二重予約、直列化失敗（40001）は
    // リトライ対象の一時的な競合として扱う
    fn classify_conflict(e: sqlx::Error) -> AppError {
        let code = e
            .as_database_error()
            .and_then(|db| db.code().map(|c| c.to_string()));
        match code.as_deref() {
            Some("23505") => {
                AppError::AlreadyBooked("同一スロット・同一日の予約がすでに存在します。".into())
            }
            Some("40001") => AppError::StorageConflict("予約の作成が競合しました。".into()),
            _ => AppError::SpecificOperationError(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{slot::SlotRepositoryImpl, user::UserRepositoryImpl};
    use chrono::{NaiveDate, NaiveTime};
    use kernel::model::{
        role::Role,
        slot::{event::CreateSlot, Facility},
        user::event::CreateUser,
    };
    use kernel::repository::{slot::SlotRepository, user::UserRepository};

    async fn register_user(
        pool: &sqlx::PgPool,
        surname: &str,
        name: &str,
    ) -> anyhow::Result<UserId> {
        let repo = UserRepositoryImpl::new(ConnectionPool::new(pool.clone()));
        let user_id = repo
            .create(CreateUser {
                name: name.into(),
                surname: surname.into(),
                group: "ATLA".into(),
                email: format!("{name}.{surname}@example.local").to_lowercase(),
                password: "ChangeMe123!".into(),
                role: Role::User,
            })
            .await?;
        Ok(user_id)
    }

    async fn register_slot(
        pool: &sqlx::PgPool,
        weekday: i16,
        capacity: Option<i32>,
    ) -> anyhow::Result<SlotId> {
        let repo = SlotRepositoryImpl::new(ConnectionPool::new(pool.clone()));
        let slot_id = repo
            .create(CreateSlot {
                facility: Facility::Gym,
                title: "1st shift".into(),
                weekday,
                starts_at: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
                ends_at: NaiveTime::from_hms_opt(17, 15, 0).unwrap(),
                capacity,
                is_active: true,
            })
            .await?;
        Ok(slot_id)
    }

    // 2024-06-05 は水曜日（weekday = 3）
    fn wednesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 5).unwrap()
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn reserve_worked_example(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let repo = BookingRepositoryImpl::new(ConnectionPool::new(pool.clone()));
        let slot_id = register_slot(&pool, 3, Some(2)).await?;
        let user_a = register_user(&pool, "Rossi", "Anna").await?;
        let user_b = register_user(&pool, "Bianchi", "Bruno").await?;
        let user_c = register_user(&pool, "Verdi", "Carla").await?;
        let user_d = register_user(&pool, "Neri", "Dario").await?;

        repo.create(CreateBooking::new(user_a, slot_id, wednesday()))
            .await?;
        repo.create(CreateBooking::new(user_b, slot_id, wednesday()))
            .await?;

        // 定員 2 に達しているので 3 人目は失敗する
        let res = repo
            .create(CreateBooking::new(user_c, slot_id, wednesday()))
            .await;
        assert!(matches!(res, Err(AppError::SlotFull(_))));

        // 同一ユーザーの再予約は AlreadyBooked
        let res = repo
            .create(CreateBooking::new(user_a, slot_id, wednesday()))
            .await;
        assert!(matches!(res, Err(AppError::AlreadyBooked(_))));

        // 2024-06-06 は木曜日なので開催日ではない
        let thursday = NaiveDate::from_ymd_opt(2024, 6, 6).unwrap();
        let res = repo
            .create(CreateBooking::new(user_d, slot_id, thursday))
            .await;
        assert!(matches!(res, Err(AppError::SlotUnavailable(_))));

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn reserve_unknown_slot_is_not_found(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let repo = BookingRepositoryImpl::new(ConnectionPool::new(pool.clone()));
        let user_id = register_user(&pool, "Rossi", "Anna").await?;

        let res = repo
            .create(CreateBooking::new(user_id, SlotId::new(), wednesday()))
            .await;
        assert!(matches!(res, Err(AppError::EntityNotFound(_))));

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn unlimited_slot_never_fills_up(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let repo = BookingRepositoryImpl::new(ConnectionPool::new(pool.clone()));
        let slot_id = register_slot(&pool, 3, None).await?;

        for i in 0..5 {
            let user_id = register_user(&pool, &format!("Surname{i}"), &format!("Name{i}")).await?;
            repo.create(CreateBooking::new(user_id, slot_id, wednesday()))
                .await?;
        }

        let bookers = repo
            .find_bookers_by_slot_and_date(slot_id, wednesday())
            .await?;
        assert_eq!(bookers.len(), 5);

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn deactivated_slot_rejects_new_bookings_but_keeps_existing(
        pool: sqlx::PgPool,
    ) -> anyhow::Result<()> {
        let booking_repo = BookingRepositoryImpl::new(ConnectionPool::new(pool.clone()));
        let slot_repo = SlotRepositoryImpl::new(ConnectionPool::new(pool.clone()));
        let slot_id = register_slot(&pool, 3, Some(10)).await?;
        let user_a = register_user(&pool, "Rossi", "Anna").await?;
        let user_b = register_user(&pool, "Bianchi", "Bruno").await?;

        booking_repo
            .create(CreateBooking::new(user_a, slot_id, wednesday()))
            .await?;

        slot_repo.deactivate(slot_id).await?;

        let res = booking_repo
            .create(CreateBooking::new(user_b, slot_id, wednesday()))
            .await;
        assert!(matches!(res, Err(AppError::SlotUnavailable(_))));

        // 既存の予約はそのまま残る
        let bookers = booking_repo
            .find_bookers_by_slot_and_date(slot_id, wednesday())
            .await?;
        assert_eq!(bookers.len(), 1);

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn cancel_requires_owner_or_admin(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let repo = BookingRepositoryImpl::new(ConnectionPool::new(pool.clone()));
        let slot_id = register_slot(&pool, 3, Some(10)).await?;
        let owner = register_user(&pool, "Rossi", "Anna").await?;
        let other = register_user(&pool, "Bianchi", "Bruno").await?;

        let booking_id = repo
            .create(CreateBooking::new(owner, slot_id, wednesday()))
            .await?;

        // 存在しない予約は NotFound
        let res = repo
            .cancel(CancelBooking::new(BookingId::new(), owner, false))
            .await;
        assert!(matches!(res, Err(AppError::EntityNotFound(_))));

        // 他人の予約は管理者でない限りキャンセルできない
        let res = repo
            .cancel(CancelBooking::new(booking_id, other, false))
            .await;
        assert!(matches!(res, Err(AppError::ForbiddenOperation)));

        // 本人によるキャンセルは成功し、予約数がちょうど 1 減る
        repo.cancel(CancelBooking::new(booking_id, owner, false))
            .await?;
        let bookers = repo
            .find_bookers_by_slot_and_date(slot_id, wednesday())
            .await?;
        assert_eq!(bookers.len(), 0);

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn admin_can_cancel_any_booking(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let repo = BookingRepositoryImpl::new(ConnectionPool::new(pool.clone()));
        let slot_id = register_slot(&pool, 3, Some(10)).await?;
        let owner = register_user(&pool, "Rossi", "Anna").await?;
        let admin = register_user(&pool, "Meneghelli", "Massimo").await?;

        let booking_id = repo
            .create(CreateBooking::new(owner, slot_id, wednesday()))
            .await?;

        repo.cancel(CancelBooking::new(booking_id, admin, true))
            .await?;
        let bookers = repo
            .find_bookers_by_slot_and_date(slot_id, wednesday())
            .await?;
        assert_eq!(bookers.len(), 0);

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn concurrent_reserves_never_exceed_capacity(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let repo = BookingRepositoryImpl::new(ConnectionPool::new(pool.clone()));
        let slot_id = register_slot(&pool, 3, Some(2)).await?;
        let user_a = register_user(&pool, "Rossi", "Anna").await?;
        let user_b = register_user(&pool, "Bianchi", "Bruno").await?;
        let user_c = register_user(&pool, "Verdi", "Carla").await?;
        let user_d = register_user(&pool, "Neri", "Dario").await?;

        let (r1, r2, r3, r4) = tokio::join!(
            repo.create(CreateBooking::new(user_a, slot_id, wednesday())),
            repo.create(CreateBooking::new(user_b, slot_id, wednesday())),
            repo.create(CreateBooking::new(user_c, slot_id, wednesday())),
            repo.create(CreateBooking::new(user_d, slot_id, wednesday())),
        );

        let results = [r1, r2, r3, r4];
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 2);
        for result in results {
            if let Err(e) = result {
                assert!(matches!(e, AppError::SlotFull(_)));
            }
        }

        // 永続化された予約数が定員を超えていないこと
        let bookers = repo
            .find_bookers_by_slot_and_date(slot_id, wednesday())
            .await?;
        assert_eq!(bookers.len(), 2);

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn concurrent_duplicate_reserves_allow_exactly_one(
        pool: sqlx::PgPool,
    ) -> anyhow::Result<()> {
        let repo = BookingRepositoryImpl::new(ConnectionPool::new(pool.clone()));
        let slot_id = register_slot(&pool, 3, None).await?;
        let user_id = register_user(&pool, "Rossi", "Anna").await?;

        let (r1, r2) = tokio::join!(
            repo.create(CreateBooking::new(user_id, slot_id, wednesday())),
            repo.create(CreateBooking::new(user_id, slot_id, wednesday())),
        );

        let succeeded = [&r1, &r2].iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 1);
        for result in [r1, r2] {
            if let Err(e) = result {
                assert!(matches!(e, AppError::AlreadyBooked(_)));
            }
        }

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn bookers_are_ordered_by_surname_then_name(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let repo = BookingRepositoryImpl::new(ConnectionPool::new(pool.clone()));
        let slot_id = register_slot(&pool, 3, None).await?;

        // 姓が同じ場合は名で並ぶ
        for (surname, name) in [
            ("Verdi", "Carla"),
            ("Bianchi", "Bruno"),
            ("Bianchi", "Alba"),
            ("Rossi", "Anna"),
        ] {
            let user_id = register_user(&pool, surname, name).await?;
            repo.create(CreateBooking::new(user_id, slot_id, wednesday()))
                .await?;
        }

        let bookers = repo
            .find_bookers_by_slot_and_date(slot_id, wednesday())
            .await?;
        let order: Vec<(String, String)> = bookers
            .into_iter()
            .map(|b| (b.surname, b.name))
            .collect();
        assert_eq!(
            order,
            vec![
                ("Bianchi".to_string(), "Alba".to_string()),
                ("Bianchi".to_string(), "Bruno".to_string()),
                ("Rossi".to_string(), "Anna".to_string()),
                ("Verdi".to_string(), "Carla".to_string()),
            ]
        );

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn my_bookings_lists_only_the_requested_date(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let repo = BookingRepositoryImpl::new(ConnectionPool::new(pool.clone()));
        let slot_id = register_slot(&pool, 3, None).await?;
        let user_id = register_user(&pool, "Rossi", "Anna").await?;

        let next_wednesday = NaiveDate::from_ymd_opt(2024, 6, 12).unwrap();
        repo.create(CreateBooking::new(user_id, slot_id, wednesday()))
            .await?;
        repo.create(CreateBooking::new(user_id, slot_id, next_wednesday))
            .await?;

        let bookings = repo.find_by_user_and_date(user_id, wednesday()).await?;
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].booked_for, wednesday());
        assert_eq!(bookings[0].title, "1st shift");

        Ok(())
    }
}
