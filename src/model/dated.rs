use chrono::NaiveDate;

/// Entities carrying an active flag.
pub trait Activatable {
    fn active(&self) -> Option<bool>;
    fn set_active(&mut self, active: Option<bool>);
}

/// Entities valid over an inclusive calendar window. Either bound may be open.
pub trait Dated: Activatable {
    fn effective_from(&self) -> Option<NaiveDate>;
    fn set_effective_from(&mut self, date: Option<NaiveDate>);
    fn effective_to(&self) -> Option<NaiveDate>;
    fn set_effective_to(&mut self, date: Option<NaiveDate>);

    /// `effective_from <= effective_to` whenever both are set.
    fn effective_dates_valid(&self) -> bool {
        match (self.effective_from(), self.effective_to()) {
            (Some(from), Some(to)) => from <= to,
            _ => true,
        }
    }

    /// True when `day` lies inside the window.
    fn is_effective_on(&self, day: NaiveDate) -> bool {
        self.effective_from().map_or(true, |from| day >= from)
            && self.effective_to().map_or(true, |to| day <= to)
    }
}
