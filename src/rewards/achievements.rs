//! Achievement definitions and unlock checks.
//!
//! Unlocks are recorded per user and never relocked. Checks run after each
//! progress or quiz event against the user's current aggregates.

/// Unique identifier for each achievement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AchievementId {
    // Learning milestones
    FirstWord,
    TenWords,
    FiftyWords,

    // Quiz milestones
    FirstQuiz,
    QuizTwentyFive,

    // Streaks
    Streak3,
    Streak7,
}

impl AchievementId {
    /// String ID for database storage and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstWord => "first_word",
            Self::TenWords => "ten_words",
            Self::FiftyWords => "fifty_words",
            Self::FirstQuiz => "first_quiz",
            Self::QuizTwentyFive => "quiz_25",
            Self::Streak3 => "streak_3",
            Self::Streak7 => "streak_7",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "first_word" => Some(Self::FirstWord),
            "ten_words" => Some(Self::TenWords),
            "fifty_words" => Some(Self::FiftyWords),
            "first_quiz" => Some(Self::FirstQuiz),
            "quiz_25" => Some(Self::QuizTwentyFive),
            "streak_3" => Some(Self::Streak3),
            "streak_7" => Some(Self::Streak7),
            _ => None,
        }
    }
}

/// Check learning milestones against the words-learned count.
pub fn check_word_achievements(words_learned: i64, unlocked: &[String]) -> Vec<AchievementId> {
    let mut newly_unlocked = Vec::new();

    let milestones = [
        (1, AchievementId::FirstWord),
        (10, AchievementId::TenWords),
        (50, AchievementId::FiftyWords),
    ];

    for (threshold, id) in milestones {
        if words_learned >= threshold && !unlocked.iter().any(|u| u == id.as_str()) {
            newly_unlocked.push(id);
        }
    }

    newly_unlocked
}

/// Check quiz milestones against the quizzes-taken count.
pub fn check_quiz_achievements(quizzes_taken: i64, unlocked: &[String]) -> Vec<AchievementId> {
    let mut newly_unlocked = Vec::new();

    let milestones = [
        (1, AchievementId::FirstQuiz),
        (25, AchievementId::QuizTwentyFive),
    ];

    for (threshold, id) in milestones {
        if quizzes_taken >= threshold && !unlocked.iter().any(|u| u == id.as_str()) {
            newly_unlocked.push(id);
        }
    }

    newly_unlocked
}

/// Check streak achievements against the current daily streak.
pub fn check_streak_achievements(streak: i64, unlocked: &[String]) -> Vec<AchievementId> {
    let mut newly_unlocked = Vec::new();

    let milestones = [(3, AchievementId::Streak3), (7, AchievementId::Streak7)];

    for (threshold, id) in milestones {
        if streak >= threshold && !unlocked.iter().any(|u| u == id.as_str()) {
            newly_unlocked.push(id);
        }
    }

    newly_unlocked
}
