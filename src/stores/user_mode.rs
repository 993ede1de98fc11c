use crate::models::habitat::UserRole;

/// Current role of the session. Starts as [`UserRole::Operator`].
#[derive(Debug, Clone, Default)]
pub struct UserModeStore {
    mode: UserRole,
}

impl UserModeStore {
    pub fn new(mode: UserRole) -> Self {
        UserModeStore { mode }
    }

    pub fn mode(&self) -> UserRole {
        self.mode
    }

    pub fn set_mode(&mut self, mode: UserRole) {
        self.mode = mode;
    }

    /// True only for operators; programmers are not operators.
    pub fn is_operator(&self) -> bool {
        self.mode == UserRole::Operator
    }

    pub fn is_programmer(&self) -> bool {
        self.mode == UserRole::Programmer
    }

    /// viewer -> operator -> programmer -> viewer
    pub fn cycle(&mut self) -> UserRole {
        self.mode = match self.mode {
            UserRole::Viewer => UserRole::Operator,
            UserRole::Operator => UserRole::Programmer,
            UserRole::Programmer => UserRole::Viewer,
        };
        self.mode
    }
}
