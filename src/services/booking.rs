// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Class bookings.
//!
//! Creating a booking claims the teacher's (day, slot) and charges the
//! student in one step; cancelling releases the slot and refunds. Every
//! read-modify-write on a booking holds that booking's lock.

use crate::db::{collections, Db, Write};
use crate::error::{AppError, Result};
use crate::models::booking::{
    attendance_id, format_time_slot, parse_time_slot, slot_id, slots_overlap,
};
use crate::models::{
    Attendance, BookingStatus, ClassBooking, CreditKind, ParticipantRole, Role, SlotClaim,
};
use crate::services::LedgerService;
use crate::time_utils::{format_utc_rfc3339, new_id, parse_day};
use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;

/// Role of `user_id` in `booking`, or `Forbidden` for outsiders.
pub fn authorize(booking: &ClassBooking, user_id: &str) -> Result<ParticipantRole> {
    booking
        .participant_role(user_id)
        .ok_or_else(|| AppError::Forbidden("Not a participant in this booking".to_string()))
}

fn require_teacher(booking: &ClassBooking, user_id: &str) -> Result<()> {
    match authorize(booking, user_id)? {
        ParticipantRole::Teacher => Ok(()),
        ParticipantRole::Student => Err(AppError::Forbidden(
            "Only the teacher can do this".to_string(),
        )),
    }
}

/// Result of marking attendance.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceOutcome {
    /// False when this role had already been marked
    pub recorded: bool,
    pub role: ParticipantRole,
    pub booking: ClassBooking,
}

#[derive(Clone)]
pub struct BookingService {
    db: Db,
    ledger: LedgerService,
    credit_cost: i64,
}

impl BookingService {
    pub fn new(db: Db, ledger: LedgerService, credit_cost: i64) -> Self {
        Self {
            db,
            ledger,
            credit_cost,
        }
    }

    async fn load(&self, booking_id: &str) -> Result<ClassBooking> {
        self.db
            .get(collections::BOOKINGS, booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", booking_id)))
    }

    /// Book `time_slot` on `day` with a teacher.
    pub async fn create(
        &self,
        student_id: &str,
        teacher_id: &str,
        day: &str,
        time_slot: &str,
        now: DateTime<Utc>,
    ) -> Result<ClassBooking> {
        let day = parse_day(day)
            .ok_or_else(|| AppError::BadRequest("day must be YYYY-MM-DD".to_string()))?;
        if day < now.date_naive() {
            return Err(AppError::BadRequest("day is in the past".to_string()));
        }
        let requested = parse_time_slot(time_slot).ok_or_else(|| {
            AppError::BadRequest("time_slot must be HH:MM-HH:MM with start before end".to_string())
        })?;
        let canonical_slot = format_time_slot(requested.0, requested.1);
        let time_slot = canonical_slot.as_str();
        if student_id == teacher_id {
            return Err(AppError::BadRequest("Cannot book a class with yourself".to_string()));
        }

        let teacher = self
            .db
            .get_user(teacher_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Teacher {} not found", teacher_id)))?;
        if !teacher.has_role(Role::Teacher) {
            return Err(AppError::BadRequest(format!("User {} is not a teacher", teacher_id)));
        }

        let booking_id = new_id()?;
        let claim_id = slot_id(teacher_id, day, time_slot);
        let claim = SlotClaim {
            booking_id: booking_id.clone(),
            teacher_id: teacher_id.to_string(),
            day,
            time_slot: time_slot.to_string(),
        };
        self.claim_slot(&claim_id, &claim, requested).await?;

        let timestamp = format_utc_rfc3339(now);
        let booking = ClassBooking {
            id: booking_id.clone(),
            teacher_id: teacher_id.to_string(),
            student_id: student_id.to_string(),
            day,
            time_slot: time_slot.to_string(),
            status: BookingStatus::Pending,
            credits_spent: self.credit_cost,
            created_at: timestamp.clone(),
            updated_at: timestamp,
            cancelled_by: None,
            cancel_reason: None,
        };

        let charged = match Write::set(collections::BOOKINGS, &booking_id, &booking) {
            Ok(write) => {
                self.ledger
                    .apply(
                        student_id,
                        CreditKind::Spend,
                        self.credit_cost,
                        "Class booking",
                        &format!("booking-{}", booking_id),
                        now,
                        vec![write],
                    )
                    .await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = charged {
            if let Err(release) = self.db.delete(collections::BOOKING_SLOTS, &claim_id).await {
                tracing::error!(
                    booking_id = %booking_id,
                    error = %release,
                    "Failed to release slot after unsuccessful charge"
                );
            }
            return Err(e);
        }

        tracing::info!(
            booking_id = %booking.id,
            teacher_id,
            student_id,
            day = %day,
            time_slot,
            credits = self.credit_cost,
            "Booking created"
        );
        Ok(booking)
    }

    /// Claim the teacher's slot, rejecting any overlap with the claims
    /// already held for that day.
    async fn claim_slot(
        &self,
        claim_id: &str,
        claim: &SlotClaim,
        requested: (NaiveTime, NaiveTime),
    ) -> Result<()> {
        let day = claim.day.to_string();
        let _day_guard = self
            .db
            .lock(
                collections::BOOKING_SLOTS,
                &format!("{}_{}", claim.teacher_id, day),
            )
            .await;

        let held: Vec<SlotClaim> = self
            .db
            .query_eq(
                collections::BOOKING_SLOTS,
                &[("teacher_id", claim.teacher_id.as_str()), ("day", day.as_str())],
            )
            .await?;
        let clash = held.iter().find(|other| {
            parse_time_slot(&other.time_slot).is_some_and(|slot| slots_overlap(slot, requested))
        });
        if let Some(other) = clash {
            return Err(AppError::InvalidState(format!(
                "Teacher is already booked for {} {}",
                day, other.time_slot
            )));
        }

        if !self
            .db
            .create(collections::BOOKING_SLOTS, claim_id, claim)
            .await?
        {
            return Err(AppError::InvalidState(format!(
                "Teacher is already booked for {} {}",
                day, claim.time_slot
            )));
        }
        Ok(())
    }

    pub async fn get(&self, booking_id: &str, user_id: &str) -> Result<ClassBooking> {
        let booking = self.load(booking_id).await?;
        authorize(&booking, user_id)?;
        Ok(booking)
    }

    /// Bookings where the user is teacher or student, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<ClassBooking>> {
        let mut bookings: Vec<ClassBooking> = self
            .db
            .query_eq(collections::BOOKINGS, &[("teacher_id", user_id)])
            .await?;
        let as_student: Vec<ClassBooking> = self
            .db
            .query_eq(collections::BOOKINGS, &[("student_id", user_id)])
            .await?;
        bookings.extend(as_student.into_iter().filter(|b| b.teacher_id != user_id));

        bookings.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(bookings)
    }

    /// Teacher accepts a pending booking.
    pub async fn confirm(
        &self,
        booking_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ClassBooking> {
        self.teacher_transition(booking_id, user_id, BookingStatus::Confirmed, now)
            .await
    }

    /// Teacher closes a confirmed booking.
    pub async fn complete(
        &self,
        booking_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ClassBooking> {
        self.teacher_transition(booking_id, user_id, BookingStatus::Completed, now)
            .await
    }

    async fn teacher_transition(
        &self,
        booking_id: &str,
        user_id: &str,
        next: BookingStatus,
        now: DateTime<Utc>,
    ) -> Result<ClassBooking> {
        let _guard = self.db.lock(collections::BOOKINGS, booking_id).await;

        let mut booking = self.load(booking_id).await?;
        require_teacher(&booking, user_id)?;

        booking.status = booking.status.transition(next)?;
        booking.updated_at = format_utc_rfc3339(now);
        self.db
            .set(collections::BOOKINGS, booking_id, &booking)
            .await?;

        tracing::info!(booking_id, status = next.as_str(), "Booking updated");
        Ok(booking)
    }

    /// Either participant cancels; the slot is released and the student refunded.
    pub async fn cancel(
        &self,
        booking_id: &str,
        user_id: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ClassBooking> {
        let _guard = self.db.lock(collections::BOOKINGS, booking_id).await;

        let mut booking = self.load(booking_id).await?;
        authorize(&booking, user_id)?;

        booking.status = booking.status.transition(BookingStatus::Cancelled)?;
        booking.updated_at = format_utc_rfc3339(now);
        booking.cancelled_by = Some(user_id.to_string());
        booking.cancel_reason = reason;

        let mut writes = vec![Write::set(collections::BOOKINGS, booking_id, &booking)?];

        let claim_id = slot_id(&booking.teacher_id, booking.day, &booking.time_slot);
        let claim: Option<SlotClaim> = self.db.get(collections::BOOKING_SLOTS, &claim_id).await?;
        if claim.is_some_and(|c| c.booking_id == booking.id) {
            writes.push(Write::delete(collections::BOOKING_SLOTS, claim_id));
        }

        if booking.credits_spent > 0 {
            self.ledger
                .apply(
                    &booking.student_id,
                    CreditKind::Refund,
                    booking.credits_spent,
                    "Class cancelled",
                    &format!("booking-refund-{}", booking.id),
                    now,
                    writes,
                )
                .await?;
        } else {
            self.db.commit(writes).await?;
        }

        tracing::info!(
            booking_id,
            cancelled_by = user_id,
            refunded = booking.credits_spent,
            "Booking cancelled"
        );
        Ok(booking)
    }

    /// Mark the caller as present. When both sides are marked the booking
    /// is completed.
    pub async fn mark_attendance(
        &self,
        booking_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<AttendanceOutcome> {
        let _guard = self.db.lock(collections::BOOKINGS, booking_id).await;

        let mut booking = self.load(booking_id).await?;
        let role = authorize(&booking, user_id)?;

        let other = match role {
            ParticipantRole::Teacher => ParticipantRole::Student,
            ParticipantRole::Student => ParticipantRole::Teacher,
        };
        let other_marked: Option<Attendance> = self
            .db
            .get(collections::BOOKING_ATTENDANCE, &attendance_id(booking_id, other))
            .await?;

        let existing: Option<Attendance> = self
            .db
            .get(collections::BOOKING_ATTENDANCE, &attendance_id(booking_id, role))
            .await?;
        if existing.is_some() {
            tracing::debug!(booking_id, role = role.as_str(), "Attendance already marked");
            // Both rows may exist on a booking left CONFIRMED by older writes.
            if other_marked.is_some() && booking.status == BookingStatus::Confirmed {
                booking.status = booking.status.transition(BookingStatus::Completed)?;
                booking.updated_at = format_utc_rfc3339(now);
                self.db
                    .set(collections::BOOKINGS, booking_id, &booking)
                    .await?;
                tracing::info!(booking_id, "Both participants attended, booking completed");
            }
            return Ok(AttendanceOutcome {
                recorded: false,
                role,
                booking,
            });
        }

        if booking.status != BookingStatus::Confirmed {
            return Err(AppError::InvalidState(format!(
                "Attendance requires a CONFIRMED booking, this one is {}",
                booking.status.as_str()
            )));
        }

        let timestamp = format_utc_rfc3339(now);
        let attendance = Attendance {
            booking_id: booking_id.to_string(),
            user_id: user_id.to_string(),
            role,
            marked_at: timestamp.clone(),
        };

        if other_marked.is_some() {
            // Last side in: the attendance row and the completion land together.
            booking.status = booking.status.transition(BookingStatus::Completed)?;
            booking.updated_at = timestamp;
            self.db
                .commit(vec![
                    Write::set(
                        collections::BOOKING_ATTENDANCE,
                        attendance_id(booking_id, role),
                        &attendance,
                    )?,
                    Write::set(collections::BOOKINGS, booking_id, &booking)?,
                ])
                .await?;
            tracing::info!(booking_id, "Both participants attended, booking completed");
        } else if !self
            .db
            .create(
                collections::BOOKING_ATTENDANCE,
                &attendance_id(booking_id, role),
                &attendance,
            )
            .await?
        {
            return Ok(AttendanceOutcome {
                recorded: false,
                role,
                booking,
            });
        }

        tracing::info!(booking_id, role = role.as_str(), "Attendance marked");
        Ok(AttendanceOutcome {
            recorded: true,
            role,
            booking,
        })
    }
}
