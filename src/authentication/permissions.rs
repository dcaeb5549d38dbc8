use crate::{jwt::SessionData, schema::UserRole};

const USER_ACTIONS: &[ActionType] = &[
    ActionType::ManageOwnProfile,
    ActionType::ManageOwnFavorites,
    ActionType::ManageOwnCart,
    ActionType::ManageOwnSubscriptions,
    ActionType::CreateRecipes,
    ActionType::ManageOwnRecipes,
];

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (UserRole::User, USER_ACTIONS),
    (
        UserRole::Admin,
        &[
            ActionType::ManageOwnProfile,
            ActionType::ManageOwnFavorites,
            ActionType::ManageOwnCart,
            ActionType::ManageOwnSubscriptions,
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageAllRecipes,
            ActionType::ManageTags,
            ActionType::ManageIngredients,
            ActionType::ManageUsers,
        ],
    ),
];

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnProfile,
    ManageOwnFavorites,
    ManageOwnCart,
    ManageOwnSubscriptions,
    ManageOwnRecipes,

    ManageUsers,
    ManageAllRecipes,
    ManageTags,
    ManageIngredients,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        let role = &session.role;

        ACTION_TABLE
            .iter()
            .find_map(|(uid, actions)| {
                if role != uid {
                    return None;
                }

                Some(actions.contains(&self))
            })
            .unwrap_or(false)
    }
}
