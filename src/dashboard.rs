//! The dashboard page: a user's balance, totals, spending by category and
//! recent transactions.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    db::lock_connection,
    html::{
        PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base,
        error_view, format_currency,
    },
    stats::{Statistics, compute_statistics},
    transaction::{Transaction, get_transactions_in_range},
    user::{User, UserID, get_user_by_id},
};

/// How many transactions to list on the dashboard.
const RECENT_TRANSACTION_COUNT: usize = 20;

/// The state needed for displaying the dashboard page.
#[derive(Debug, Clone)]
pub struct DashboardState {
    /// The database connection for reading the user and their transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Display a user's financial overview.
///
/// Unknown users get a 404 page rather than a JSON error.
pub async fn get_dashboard_page(
    State(state): State<DashboardState>,
    Path(user_id): Path<i64>,
) -> Response {
    match load_dashboard(UserID::new(user_id), &state.db_connection) {
        Ok((user, transactions)) => {
            let statistics = compute_statistics(&transactions);
            Html(dashboard_view(&user, &statistics, &transactions).into_string()).into_response()
        }
        Err(Error::NotFound) => (
            StatusCode::NOT_FOUND,
            Html(
                error_view(
                    "Not Found",
                    "404",
                    "Usuario no encontrado",
                    "Comprueba el identificador del usuario.",
                )
                .into_string(),
            ),
        )
            .into_response(),
        Err(error) => {
            tracing::error!("could not load the dashboard for user {user_id}: {error}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(
                    error_view(
                        "Internal Server Error",
                        "500",
                        "Algo salió mal",
                        "Inténtalo de nuevo más tarde.",
                    )
                    .into_string(),
                ),
            )
                .into_response()
        }
    }
}

fn load_dashboard(
    user_id: UserID,
    db_connection: &Mutex<Connection>,
) -> Result<(User, Vec<Transaction>), Error> {
    let connection = lock_connection(db_connection)?;
    let user = get_user_by_id(user_id, &connection)?;
    let transactions = get_transactions_in_range(user_id, None, None, &connection)?;

    Ok((user, transactions))
}

fn dashboard_view(user: &User, statistics: &Statistics, transactions: &[Transaction]) -> Markup {
    let content = html! {
        div class=(PAGE_CONTAINER_STYLE)
        {
            h1 class="text-2xl font-bold mb-4" { "Hola, " (user.name) }

            section class="grid grid-cols-1 sm:grid-cols-3 gap-4 w-full max-w-4xl mb-8"
            {
                (summary_card("balance", "Balance", user.balance))
                (summary_card("income", "Ingresos", statistics.total_income))
                (summary_card("expenses", "Gastos", statistics.total_expenses))
            }

            (category_table(statistics))
            (recent_transactions_table(transactions))
        }
    };

    base("Dashboard", &content)
}

fn summary_card(id: &str, label: &str, amount: f64) -> Markup {
    html! {
        div id=(id) class="bg-white dark:bg-gray-800 rounded-lg p-4 shadow-md"
        {
            p class="text-sm text-gray-600 dark:text-gray-400" { (label) }
            p class="text-xl font-semibold" data-amount=(amount) { (format_currency(amount)) }
        }
    }
}

fn category_table(statistics: &Statistics) -> Markup {
    let mut categories: Vec<_> = statistics.by_category.iter().collect();
    categories.sort_by(|a, b| b.1.total_cmp(a.1));

    html! {
        section class="w-full max-w-4xl mb-8"
        {
            h2 class="text-xl font-semibold mb-2" { "Por categoría" }

            @if categories.is_empty() {
                p { "Todavía no hay transacciones." }
            } @else {
                table id="categories" class="w-full text-sm text-left"
                {
                    thead class=(TABLE_HEADER_STYLE)
                    {
                        tr
                        {
                            th scope="col" class=(TABLE_CELL_STYLE) { "Categoría" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Total" }
                        }
                    }

                    tbody
                    {
                        @for (category, total) in categories {
                            tr class=(TABLE_ROW_STYLE)
                            {
                                td class=(TABLE_CELL_STYLE) { (category) }
                                td class=(TABLE_CELL_STYLE) { (format_currency(*total)) }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn recent_transactions_table(transactions: &[Transaction]) -> Markup {
    html! {
        section class="w-full max-w-4xl"
        {
            h2 class="text-xl font-semibold mb-2" { "Transacciones recientes" }

            table id="transactions" class="w-full text-sm text-left"
            {
                thead class=(TABLE_HEADER_STYLE)
                {
                    tr
                    {
                        th scope="col" class=(TABLE_CELL_STYLE) { "Fecha" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Descripción" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Categoría" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Importe" }
                    }
                }

                tbody
                {
                    @for transaction in transactions.iter().take(RECENT_TRANSACTION_COUNT) {
                        tr class=(TABLE_ROW_STYLE)
                        {
                            td class=(TABLE_CELL_STYLE) { (transaction.date) }
                            td class=(TABLE_CELL_STYLE) { (transaction.description) }
                            td class=(TABLE_CELL_STYLE) { (transaction.category) }
                            td class=(TABLE_CELL_STYLE) { (format_currency(transaction.amount)) }
                        }
                    }
                }
            }
        }
    }
}
