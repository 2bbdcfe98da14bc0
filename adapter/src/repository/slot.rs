use crate::database::{
    model::slot::{SlotAvailabilityRow, SlotRow},
    ConnectionPool,
};
use async_trait::async_trait;
use chrono::{Datelike, NaiveTime};
use derive_new::new;
use kernel::model::{
    id::SlotId,
    slot::{
        event::{CreateSlot, UpdateSlot},
        AvailabilityQuery, Slot, SlotAvailability,
    },
};
use kernel::repository::slot::SlotRepository;
use shared::error::{AppError, AppResult};

#[derive(new)]
pub struct SlotRepositoryImpl {
    db: ConnectionPool,
}

#[async_trait]
impl SlotRepository for SlotRepositoryImpl {
    async fn create(&self, event: CreateSlot) -> AppResult<SlotId> {
        validate_slot_definition(
            event.weekday,
            event.starts_at,
            event.ends_at,
            event.capacity,
        )?;

        let slot_id = SlotId::new();
        let res = sqlx::query(
            r#"
                INSERT INTO slots
                (slot_id, facility, title, weekday, starts_at, ends_at, capacity, is_active)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(slot_id)
        .bind(event.facility.as_ref())
        .bind(&event.title)
        .bind(event.weekday)
        .bind(event.starts_at)
        .bind(event.ends_at)
        .bind(event.capacity)
        .bind(event.is_active)
        .execute(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(AppError::NoRowsAffectedError(
                "No slot record has been created".into(),
            ));
        }

        Ok(slot_id)
    }

    // 部分更新を行う。
    // 触られなかったフィールドは現在の値を引き継ぎ、マージ後の定義を
    // 改めて検証してから書き戻す
    async fn update(&self, event: UpdateSlot) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let current: Option<SlotRow> = sqlx::query_as(
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

        let current: Slot = match current {
            None => {
                return Err(AppError::EntityNotFound(format!(
                    "スロット（{}）が見つかりませんでした。",
                    event.slot_id
                )))
            }
            Some(row) => row.try_into()?,
        };

        let facility = event.facility.unwrap_or(current.facility);
        let title = event.title.unwrap_or(current.title);
        let weekday = event.weekday.unwrap_or(current.weekday);
        let starts_at = event.starts_at.unwrap_or(current.starts_at);
        let ends_at = event.ends_at.unwrap_or(current.ends_at);
        let capacity = event.capacity.unwrap_or(current.capacity);
        let is_active = event.is_active.unwrap_or(current.is_active);

        validate_slot_definition(weekday, starts_at, ends_at, capacity)?;

        let res = sqlx::query(
            r#"
                UPDATE slots
                SET facility = $2,
                    title = $3,
                    weekday = $4,
                    starts_at = $5,
                    ends_at = $6,
                    capacity = $7,
                    is_active = $8
                WHERE slot_id = $1
            "#,
        )
        .bind(event.slot_id)
        .bind(facility.as_ref())
        .bind(&title)
        .bind(weekday)
        .bind(starts_at)
        .bind(ends_at)
        .bind(capacity)
        .bind(is_active)
        .execute(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(AppError::NoRowsAffectedError(
                "No slot record has been updated".into(),
            ));
        }

        tx.commit().await.map_err(AppError::TransactionError)?;

        Ok(())
    }

    // 無効化する。既存の予約は保持するため、ハードデリートはしない。
    // すでに無効なスロットを無効化しても成功とする（冪等）
    async fn deactivate(&self, slot_id: SlotId) -> AppResult<()> {
        let res = sqlx::query("UPDATE slots SET is_active = FALSE WHERE slot_id = $1")
            .bind(slot_id)
            .execute(self.db.inner_ref())
            .await
            .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(AppError::EntityNotFound(format!(
                "スロット（{slot_id}）が見つかりませんでした。"
            )));
        }

        Ok(())
    }

    async fn find_by_id(&self, slot_id: SlotId) -> AppResult<Option<Slot>> {
        let row: Option<SlotRow> = sqlx::query_as(
            r#"
                SELECT slot_id, facility, title, weekday, starts_at, ends_at, capacity, is_active
                FROM slots
                WHERE slot_id = $1
            "#,
        )
        .bind(slot_id)
        .fetch_optional(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        row.map(Slot::try_from).transpose()
    }

    // 管理者向けの一覧。施設・曜日・開始時刻の順に並べる
    async fn find_all(&self) -> AppResult<Vec<Slot>> {
        let rows: Vec<SlotRow> = sqlx::query_as(
            r#"
                SELECT slot_id, facility, title, weekday, starts_at, ends_at, capacity, is_active
                FROM slots
                ORDER BY facility ASC, weekday ASC, starts_at ASC
            "#,
        )
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        rows.into_iter().map(Slot::try_from).collect()
    }

    // 指定日に開催されるアクティブなスロットの一覧を、
    // その日のコミット済み予約数とあわせて取得する。
    // 残席数は導出値なので、ここでは数だけを返して計算は kernel に任せる
    async fn find_availability(
        &self,
        query: AvailabilityQuery,
    ) -> AppResult<Vec<SlotAvailability>> {
        let weekday = i16::try_from(query.date.weekday().number_from_monday())
            .map_err(|e| AppError::ConversionEntityError(e.to_string()))?;
        let facility = query.facility.map(|f| f.as_ref().to_string());

        let rows: Vec<SlotAvailabilityRow> = sqlx::query_as(
            r#"
                SELECT
                    s.slot_id,
                    s.facility,
                    s.title,
                    s.weekday,
                    s.starts_at,
                    s.ends_at,
                    s.capacity,
                    s.is_active,
                    COALESCE(b.booked_count, 0) AS booked_count,
                    EXISTS (
                        SELECT 1 FROM bookings AS mine
                        WHERE mine.slot_id = s.slot_id
                          AND mine.booked_for = $1
                          AND mine.user_id = $2
                    ) AS booked_by_caller
                FROM slots AS s
                LEFT JOIN (
                    SELECT slot_id, COUNT(*) AS booked_count
                    FROM bookings
                    WHERE booked_for = $1
                    GROUP BY slot_id
                ) AS b ON b.slot_id = s.slot_id
                WHERE s.is_active = TRUE
                  AND s.weekday = $3
                  AND ($4::VARCHAR IS NULL OR s.facility = $4)
                ORDER BY s.facility ASC, s.starts_at ASC
            "#,
        )
        .bind(query.date)
        .bind(query.caller)
        .bind(weekday)
        .bind(facility)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        rows.into_iter().map(SlotAvailability::try_from).collect()
    }
}

// スロット定義の検証。作成時と更新のマージ後の両方で使う
fn validate_slot_definition(
    weekday: i16,
    starts_at: NaiveTime,
    ends_at: NaiveTime,
    capacity: Option<i32>,
) -> AppResult<()> {
    if !(1..=7).contains(&weekday) {
        return Err(AppError::UnprocessableEntity(format!(
            "weekday は 1〜7 の範囲で指定してください（指定値: {weekday}）"
        )));
    }
    if starts_at >= ends_at {
        return Err(AppError::UnprocessableEntity(format!(
            "開始時刻は終了時刻より前でなければなりません（{starts_at} >= {ends_at}）"
        )));
    }
    if let Some(cap) = capacity {
        if cap <= 0 {
            return Err(AppError::UnprocessableEntity(format!(
                "capacity は正の整数か未指定（無制限）でなければなりません（指定値: {cap}）"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use kernel::model::slot::Facility;

    fn create_event(weekday: i16, capacity: Option<i32>) -> CreateSlot {
        CreateSlot {
            facility: Facility::Pool,
            title: "Turno unico".into(),
            weekday,
            starts_at: NaiveTime::from_hms_opt(17, 10, 0).unwrap(),
            ends_at: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            capacity,
            is_active: true,
        }
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn register_and_find_slot(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let repo = SlotRepositoryImpl::new(ConnectionPool::new(pool));

        let slot_id = repo.create(create_event(2, Some(21))).await?;

        let slot = repo.find_by_id(slot_id).await?;
        assert!(slot.is_some());

        let Slot {
            slot_id: found_id,
            facility,
            title,
            weekday,
            capacity,
            is_active,
            ..
        } = slot.unwrap();
        assert_eq!(found_id, slot_id);
        assert_eq!(facility, Facility::Pool);
        assert_eq!(title, "Turno unico");
        assert_eq!(weekday, 2);
        assert_eq!(capacity, Some(21));
        assert!(is_active);

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn reject_malformed_definitions(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let repo = SlotRepositoryImpl::new(ConnectionPool::new(pool));

        let res = repo.create(create_event(8, Some(10))).await;
        assert!(matches!(res, Err(AppError::UnprocessableEntity(_))));

        let res = repo.create(create_event(2, Some(0))).await;
        assert!(matches!(res, Err(AppError::UnprocessableEntity(_))));

        let mut event = create_event(2, Some(10));
        event.starts_at = NaiveTime::from_hms_opt(18, 0, 0).unwrap();
        event.ends_at = NaiveTime::from_hms_opt(17, 10, 0).unwrap();
        let res = repo.create(event).await;
        assert!(matches!(res, Err(AppError::UnprocessableEntity(_))));

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn partial_update_validates_merged_definition(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let repo = SlotRepositoryImpl::new(ConnectionPool::new(pool));
        let slot_id = repo.create(create_event(2, Some(21))).await?;

        // タイトルだけの更新
        repo.update(UpdateSlot {
            slot_id,
            facility: None,
            title: Some("Turno 1".into()),
            weekday: None,
            starts_at: None,
            ends_at: None,
            capacity: None,
            is_active: None,
        })
        .await?;

        // 終了時刻だけを開始時刻より前へ動かすとマージ後の検証で弾かれる
        let res = repo
            .update(UpdateSlot {
                slot_id,
                facility: None,
                title: None,
                weekday: None,
                starts_at: None,
                ends_at: Some(NaiveTime::from_hms_opt(16, 0, 0).unwrap()),
                capacity: None,
                is_active: None,
            })
            .await;
        assert!(matches!(res, Err(AppError::UnprocessableEntity(_))));

        // 定員を無制限へ変更
        repo.update(UpdateSlot {
            slot_id,
            facility: None,
            title: None,
            weekday: None,
            starts_at: None,
            ends_at: None,
            capacity: Some(None),
            is_active: None,
        })
        .await?;

        let slot = repo.find_by_id(slot_id).await?.unwrap();
        assert_eq!(slot.title, "Turno 1");
        assert_eq!(slot.capacity, None);

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn deactivate_is_idempotent(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let repo = SlotRepositoryImpl::new(ConnectionPool::new(pool));
        let slot_id = repo.create(create_event(2, Some(21))).await?;

        repo.deactivate(slot_id).await?;
        // 2 回目も成功する
        repo.deactivate(slot_id).await?;

        let slot = repo.find_by_id(slot_id).await?.unwrap();
        assert!(!slot.is_active);

        // 存在しないスロットは NotFound
        let res = repo.deactivate(SlotId::new()).await;
        assert!(matches!(res, Err(AppError::EntityNotFound(_))));

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn availability_lists_only_matching_active_slots(
        pool: sqlx::PgPool,
    ) -> anyhow::Result<()> {
        use crate::repository::user::UserRepositoryImpl;
        use kernel::model::{role::Role, user::event::CreateUser};
        use kernel::repository::user::UserRepository;

        let repo = SlotRepositoryImpl::new(ConnectionPool::new(pool.clone()));
        let user_repo = UserRepositoryImpl::new(ConnectionPool::new(pool.clone()));

        let caller = user_repo
            .create(CreateUser {
                name: "Anna".into(),
                surname: "Rossi".into(),
                group: "ATLA".into(),
                email: "anna.rossi@example.local".into(),
                password: "ChangeMe123!".into(),
                role: Role::User,
            })
            .await?;

        // 火曜のプール、水曜のプール、水曜のジム（無効）
        let tuesday_pool = repo.create(create_event(2, Some(21))).await?;
        let mut wed = create_event(3, Some(14));
        wed.title = "Turno 1".into();
        let wednesday_pool = repo.create(wed).await?;
        let mut inactive = create_event(3, None);
        inactive.facility = Facility::Gym;
        inactive.is_active = false;
        repo.create(inactive).await?;

        // 2024-06-04 は火曜日
        let tuesday = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();
        let availability = repo
            .find_availability(AvailabilityQuery {
                date: tuesday,
                facility: None,
                caller,
            })
            .await?;
        assert_eq!(availability.len(), 1);
        assert_eq!(availability[0].slot.slot_id, tuesday_pool);
        assert_eq!(availability[0].booked_count, 0);
        assert_eq!(availability[0].remaining(), Some(21));
        assert!(!availability[0].is_full());
        assert!(!availability[0].booked_by_caller);

        // 水曜日は無効のジムを除いてプールのみ
        let wednesday = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        let availability = repo
            .find_availability(AvailabilityQuery {
                date: wednesday,
                facility: Some(Facility::Pool),
                caller,
            })
            .await?;
        assert_eq!(availability.len(), 1);
        assert_eq!(availability[0].slot.slot_id, wednesday_pool);

        Ok(())
    }
}
