use ledger::Ledger;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) ledger: Ledger,
}
