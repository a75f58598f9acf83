//! In-memory "dummy" controller with its command set, REST routes and typed
//! clients, shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::http::Method;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use svcwire_core::{
    ApplicationError, Command, CommandArgs, CommandSet, Commandable, DataPage, FilterParams,
    IdGenerator, ObjectSchema, PagingParams, TypeCode,
};
use svcwire_rpc::{
    CommandableHttpClient, DirectClient, HttpResponseSender, RestClient, RestClientConfig,
    RestQueryParams, RestRoutes, ServiceRoutes,
};

/// Port nothing listens on at the moment of the call.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dummy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub key: String,
    #[serde(default)]
    pub content: String,
}

impl Dummy {
    pub fn new(key: &str, content: &str) -> Self {
        Self {
            id: None,
            key: key.to_string(),
            content: content.to_string(),
        }
    }
}

pub fn dummy_schema() -> ObjectSchema {
    ObjectSchema::new()
        .with_optional_property("id", TypeCode::String)
        .with_required_property("key", TypeCode::String)
        .with_optional_property("content", TypeCode::String)
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Keeps dummies in a mutex-guarded list. Clones share the list.
#[derive(Debug, Clone, Default)]
pub struct DummyController {
    items: Arc<Mutex<Vec<Dummy>>>,
}

impl DummyController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn get_page_by_filter(
        &self,
        _correlation_id: Option<&str>,
        filter: &FilterParams,
        paging: &PagingParams,
    ) -> DataPage<Dummy> {
        let key = filter.get("key");
        let skip = usize::try_from(paging.get_skip(0)).unwrap_or(usize::MAX);
        let take = usize::try_from(paging.get_take(100)).unwrap_or(usize::MAX);
        let items = self.items.lock();
        let data = items
            .iter()
            .filter(|item| key.is_none_or(|k| k == item.key))
            .skip(skip)
            .take(take)
            .cloned()
            .collect();
        DataPage::new(data, None)
    }

    pub fn get_one_by_id(&self, _correlation_id: Option<&str>, id: &str) -> Option<Dummy> {
        self.items
            .lock()
            .iter()
            .find(|item| item.id.as_deref() == Some(id))
            .cloned()
    }

    pub fn create(&self, _correlation_id: Option<&str>, mut item: Dummy) -> Dummy {
        if item.id.is_none() {
            item.id = Some(IdGenerator::next_long());
        }
        self.items.lock().push(item.clone());
        item
    }

    pub fn update(&self, _correlation_id: Option<&str>, item: Dummy) -> Option<Dummy> {
        let mut items = self.items.lock();
        let existing = items.iter_mut().find(|i| i.id.is_some() && i.id == item.id)?;
        *existing = item.clone();
        Some(item)
    }

    pub fn delete_by_id(&self, _correlation_id: Option<&str>, id: &str) -> Option<Dummy> {
        let mut items = self.items.lock();
        let pos = items.iter().position(|i| i.id.as_deref() == Some(id))?;
        Some(items.remove(pos))
    }

    pub fn check_correlation_id(&self, correlation_id: Option<&str>) -> Option<String> {
        correlation_id.map(str::to_string)
    }

    pub fn raise_exception(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        Err(ApplicationError::unknown(correlation_id, "TEST_ERROR", "Dummy error in controller!"))
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, ApplicationError> {
    serde_json::to_value(value).map_err(|e| {
        ApplicationError::internal(None, "SERIALIZATION_FAILED", "encode failed").wrap(e)
    })
}

impl Commandable for DummyController {
    fn command_set(&self) -> CommandSet {
        let mut commands = CommandSet::new();

        let c = self.clone();
        commands.add_command(Command::new(
            "get_dummies",
            Some(
                ObjectSchema::new()
                    .allow_undefined(true)
                    .with_optional_property("filter", TypeCode::Object)
                    .with_optional_property("paging", TypeCode::Object),
            ),
            move |cid: Option<String>, args: CommandArgs| {
                let c = c.clone();
                async move {
                    let filter = args.value("filter").unwrap_or(&Value::Null);
                    let paging = args.value("paging").unwrap_or(&Value::Null);
                    let filter = FilterParams::from_value(filter);
                    let paging = PagingParams::from_value(paging);
                    to_value(&c.get_page_by_filter(cid.as_deref(), &filter, &paging))
                }
            },
        ));

        let c = self.clone();
        commands.add_command(Command::new(
            "get_dummy_by_id",
            Some(ObjectSchema::new().with_required_property("dummy_id", TypeCode::String)),
            move |cid: Option<String>, args: CommandArgs| {
                let c = c.clone();
                async move {
                    let id: String = args.required("dummy_id")?;
                    to_value(&c.get_one_by_id(cid.as_deref(), &id))
                }
            },
        ));

        let c = self.clone();
        commands.add_command(Command::new(
            "create_dummy",
            Some(ObjectSchema::new().with_required_property("dummy", dummy_schema())),
            move |cid: Option<String>, args: CommandArgs| {
                let c = c.clone();
                async move {
                    let dummy: Dummy = args.required("dummy")?;
                    to_value(&c.create(cid.as_deref(), dummy))
                }
            },
        ));

        let c = self.clone();
        commands.add_command(Command::new(
            "update_dummy",
            Some(ObjectSchema::new().with_required_property("dummy", dummy_schema())),
            move |cid: Option<String>, args: CommandArgs| {
                let c = c.clone();
                async move {
                    let dummy: Dummy = args.required("dummy")?;
                    to_value(&c.update(cid.as_deref(), dummy))
                }
            },
        ));

        let c = self.clone();
        commands.add_command(Command::new(
            "delete_dummy",
            Some(ObjectSchema::new().with_required_property("dummy_id", TypeCode::String)),
            move |cid: Option<String>, args: CommandArgs| {
                let c = c.clone();
                async move {
                    let id: String = args.required("dummy_id")?;
                    to_value(&c.delete_by_id(cid.as_deref(), &id))
                }
            },
        ));

        let c = self.clone();
        commands.add_command(Command::new(
            "check_correlation_id",
            None,
            move |cid: Option<String>, _args: CommandArgs| {
                let c = c.clone();
                async move {
                    Ok(json!({ "correlation_id": c.check_correlation_id(cid.as_deref()) }))
                }
            },
        ));

        let c = self.clone();
        commands.add_command(Command::new(
            "raise_exception",
            None,
            move |cid: Option<String>, _args: CommandArgs| {
                let c = c.clone();
                async move {
                    c.raise_exception(cid.as_deref())?;
                    Ok(Value::Null)
                }
            },
        ));

        commands
    }
}

// ---------------------------------------------------------------------------
// REST routes
// ---------------------------------------------------------------------------

pub struct DummyRestRoutes {
    pub controller: DummyController,
}

impl RestRoutes for DummyRestRoutes {
    fn register(&self, routes: &ServiceRoutes<'_>) -> Result<(), ApplicationError> {
        let c = self.controller.clone();
        routes.register_operation(Method::GET, "/dummies", None, "get_dummies", move |req| {
            let filter = FilterParams::from_tuples(
                req.query_param("key").map(|key| ("key", key.to_string())),
            );
            let paging = PagingParams::from_value(&req.params());
            let page = c.get_page_by_filter(req.correlation_id(), &filter, &paging);
            async move { Ok(HttpResponseSender::send_result(Some(page))) }
        });

        let c = self.controller.clone();
        routes.register_operation(
            Method::GET,
            "/dummies/{dummy_id}",
            Some(
                ObjectSchema::new()
                    .allow_undefined(true)
                    .with_required_property("dummy_id", TypeCode::String),
            ),
            "get_dummy_by_id",
            move |req| {
                let id = req.path_param("dummy_id").unwrap_or_default();
                let found = c.get_one_by_id(req.correlation_id(), id);
                async move { Ok(HttpResponseSender::send_result(found)) }
            },
        );

        let c = self.controller.clone();
        routes.register_operation(
            Method::POST,
            "/dummies",
            Some(
                ObjectSchema::new()
                    .allow_undefined(true)
                    .with_required_property("body", dummy_schema()),
            ),
            "create_dummy",
            move |req| {
                let response = req
                    .body_as::<Dummy>()
                    .map(|dummy| c.create(req.correlation_id(), dummy))
                    .map(|created| HttpResponseSender::send_created_result(Some(created)));
                async move { response }
            },
        );

        let c = self.controller.clone();
        routes.register_operation(
            Method::PUT,
            "/dummies",
            Some(
                ObjectSchema::new()
                    .allow_undefined(true)
                    .with_required_property("body", dummy_schema()),
            ),
            "update_dummy",
            move |req| {
                let response = req
                    .body_as::<Dummy>()
                    .map(|dummy| c.update(req.correlation_id(), dummy))
                    .map(HttpResponseSender::send_result);
                async move { response }
            },
        );

        let c = self.controller.clone();
        routes.register_operation(
            Method::DELETE,
            "/dummies/{dummy_id}",
            None,
            "delete_dummy",
            move |req| {
                let id = req.path_param("dummy_id").unwrap_or_default();
                let deleted = c.delete_by_id(req.correlation_id(), id);
                async move { Ok(HttpResponseSender::send_result(deleted)) }
            },
        );

        let c = self.controller.clone();
        routes.register_operation(
            Method::GET,
            "/dummies/check/correlation_id",
            None,
            "check_correlation_id",
            move |req| {
                let cid = c.check_correlation_id(req.correlation_id());
                let body = json!({ "correlation_id": cid });
                async move { Ok(HttpResponseSender::send_result(Some(body))) }
            },
        );

        let c = self.controller.clone();
        routes.register_operation(
            Method::POST,
            "/dummies/raise_exception",
            None,
            "raise_exception",
            move |req| {
                let response = c
                    .raise_exception(req.correlation_id())
                    .map(|()| HttpResponseSender::send_deleted_result());
                async move { response }
            },
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Clients
// ---------------------------------------------------------------------------

fn empty_page() -> DataPage<Dummy> {
    DataPage::new(Vec::new(), None)
}

/// Typed REST client of [`DummyRestRoutes`].
pub struct DummyRestClient {
    pub client: RestClient,
}

impl DummyRestClient {
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            client: RestClient::new("dummy", config),
        }
    }

    pub async fn get_dummies(
        &self,
        correlation_id: Option<&str>,
        filter: Option<&FilterParams>,
        paging: Option<&PagingParams>,
    ) -> Result<DataPage<Dummy>, ApplicationError> {
        let query = RestQueryParams::new(correlation_id)
            .with_filter(filter)
            .with_paging(paging);
        let call = self.client.call(
            Method::GET,
            "/dummies",
            Some(query.correlation_id()),
            query.as_pairs(),
            None,
        );
        let page = self
            .client
            .instrumentation()
            .run(correlation_id, "dummy.get_dummies", call)
            .await?;
        Ok(page.unwrap_or_else(empty_page))
    }

    pub async fn get_dummy_by_id(
        &self,
        correlation_id: Option<&str>,
        id: &str,
    ) -> Result<Option<Dummy>, ApplicationError> {
        let route = format!("/dummies/{id}");
        let call = self.client.call(Method::GET, &route, correlation_id, &[], None);
        self.client
            .instrumentation()
            .run(correlation_id, "dummy.get_dummy_by_id", call)
            .await
    }

    pub async fn create_dummy(
        &self,
        correlation_id: Option<&str>,
        dummy: &Dummy,
    ) -> Result<Option<Dummy>, ApplicationError> {
        let body = json!(dummy);
        let call = self.client.call(Method::POST, "/dummies", correlation_id, &[], Some(&body));
        self.client
            .instrumentation()
            .run(correlation_id, "dummy.create_dummy", call)
            .await
    }

    pub async fn update_dummy(
        &self,
        correlation_id: Option<&str>,
        dummy: &Dummy,
    ) -> Result<Option<Dummy>, ApplicationError> {
        let body = json!(dummy);
        let call = self.client.call(Method::PUT, "/dummies", correlation_id, &[], Some(&body));
        self.client
            .instrumentation()
            .run(correlation_id, "dummy.update_dummy", call)
            .await
    }

    pub async fn delete_dummy(
        &self,
        correlation_id: Option<&str>,
        id: &str,
    ) -> Result<Option<Dummy>, ApplicationError> {
        let route = format!("/dummies/{id}");
        let call = self.client.call(Method::DELETE, &route, correlation_id, &[], None);
        self.client
            .instrumentation()
            .run(correlation_id, "dummy.delete_dummy", call)
            .await
    }

    pub async fn check_correlation_id(
        &self,
        correlation_id: Option<&str>,
    ) -> Result<Option<Value>, ApplicationError> {
        self.client
            .call(Method::GET, "/dummies/check/correlation_id", correlation_id, &[], None)
            .await
    }

    pub async fn raise_exception(
        &self,
        correlation_id: Option<&str>,
    ) -> Result<Option<Value>, ApplicationError> {
        self.client
            .call(Method::POST, "/dummies/raise_exception", correlation_id, &[], None)
            .await
    }
}

/// Typed commandable client of the dummy command set.
pub struct DummyCommandableClient {
    pub client: CommandableHttpClient,
}

impl DummyCommandableClient {
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            client: CommandableHttpClient::new("dummy", config),
        }
    }

    pub async fn get_dummies(
        &self,
        correlation_id: Option<&str>,
        filter: Option<&FilterParams>,
        paging: Option<&PagingParams>,
    ) -> Result<DataPage<Dummy>, ApplicationError> {
        let page = self
            .client
            .call_command(
                "get_dummies",
                correlation_id,
                json!({ "filter": filter, "paging": paging }),
            )
            .await?;
        Ok(page.unwrap_or_else(empty_page))
    }

    pub async fn get_dummy_by_id(
        &self,
        correlation_id: Option<&str>,
        id: &str,
    ) -> Result<Option<Dummy>, ApplicationError> {
        self.client
            .call_command("get_dummy_by_id", correlation_id, json!({ "dummy_id": id }))
            .await
    }

    pub async fn create_dummy(
        &self,
        correlation_id: Option<&str>,
        dummy: &Dummy,
    ) -> Result<Option<Dummy>, ApplicationError> {
        self.client
            .call_command("create_dummy", correlation_id, json!({ "dummy": dummy }))
            .await
    }

    pub async fn update_dummy(
        &self,
        correlation_id: Option<&str>,
        dummy: &Dummy,
    ) -> Result<Option<Dummy>, ApplicationError> {
        self.client
            .call_command("update_dummy", correlation_id, json!({ "dummy": dummy }))
            .await
    }

    pub async fn delete_dummy(
        &self,
        correlation_id: Option<&str>,
        id: &str,
    ) -> Result<Option<Dummy>, ApplicationError> {
        self.client
            .call_command("delete_dummy", correlation_id, json!({ "dummy_id": id }))
            .await
    }
}

/// In-process client of the controller.
pub struct DummyDirectClient {
    pub client: DirectClient<DummyController>,
}

impl DummyDirectClient {
    pub fn new(controller: DummyController) -> Self {
        Self {
            client: DirectClient::new("dummy").with_controller(Arc::new(controller)),
        }
    }

    pub async fn get_dummies(
        &self,
        correlation_id: Option<&str>,
        filter: FilterParams,
        paging: PagingParams,
    ) -> Result<DataPage<Dummy>, ApplicationError> {
        let cid = correlation_id.map(str::to_string);
        self.client
            .call(correlation_id, "dummy.get_dummies", |c| async move {
                Ok(c.get_page_by_filter(cid.as_deref(), &filter, &paging))
            })
            .await
    }

    pub async fn get_dummy_by_id(
        &self,
        correlation_id: Option<&str>,
        id: &str,
    ) -> Result<Option<Dummy>, ApplicationError> {
        self.client
            .call(correlation_id, "dummy.get_dummy_by_id", |c| async move {
                Ok(c.get_one_by_id(correlation_id, id))
            })
            .await
    }

    pub async fn create_dummy(
        &self,
        correlation_id: Option<&str>,
        dummy: Dummy,
    ) -> Result<Dummy, ApplicationError> {
        self.client
            .call(correlation_id, "dummy.create_dummy", |c| async move {
                Ok(c.create(correlation_id, dummy))
            })
            .await
    }

    pub async fn update_dummy(
        &self,
        correlation_id: Option<&str>,
        dummy: Dummy,
    ) -> Result<Option<Dummy>, ApplicationError> {
        self.client
            .call(correlation_id, "dummy.update_dummy", |c| async move {
                Ok(c.update(correlation_id, dummy))
            })
            .await
    }

    pub async fn delete_dummy(
        &self,
        correlation_id: Option<&str>,
        id: &str,
    ) -> Result<Option<Dummy>, ApplicationError> {
        self.client
            .call(correlation_id, "dummy.delete_dummy", |c| async move {
                Ok(c.delete_by_id(correlation_id, id))
            })
            .await
    }
}
